//! Cache statistics
//!
//! Cheap atomic counters shared by the registry and tile cache; snapshot
//! through `TextureSystem::stats`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct CacheStats {
    tile_hits: AtomicU64,
    tile_misses: AtomicU64,
    tiles_evicted: AtomicU64,
    files_opened: AtomicU64,
    files_closed: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub tile_hits: u64,
    pub tile_misses: u64,
    pub tiles_evicted: u64,
    pub files_opened: u64,
    pub files_closed: u64,
}

impl StatsSnapshot {
    /// Fraction of tile lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.tile_hits + self.tile_misses;
        if total == 0 {
            1.0
        } else {
            self.tile_hits as f64 / total as f64
        }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile_hit(&self) {
        self.tile_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_miss(&self) {
        self.tile_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_evicted(&self) {
        self.tiles_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_opened(&self) {
        self.files_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_closed(&self) {
        self.files_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tile_hits: self.tile_hits.load(Ordering::Relaxed),
            tile_misses: self.tile_misses.load(Ordering::Relaxed),
            tiles_evicted: self.tiles_evicted.load(Ordering::Relaxed),
            files_opened: self.files_opened.load(Ordering::Relaxed),
            files_closed: self.files_closed.load(Ordering::Relaxed),
        }
    }
}
