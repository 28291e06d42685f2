//! Tile cache with a bounded byte budget
//!
//! Maps `TileId` to its decoded tile under a single lock. Misses read
//! through the owning file while the lock is held; eviction is a two-pass
//! CLOCK sweep that first clears a tile's used bit and drops it on the next
//! visit. Tiles pinned by in-flight lookups survive eviction: dropping the
//! map reference only frees the buffer once the last holder is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::texture::file::TextureFile;
use crate::texture::stats::CacheStats;
use crate::texture::tile::{Tile, TileId};

pub const DEFAULT_MAX_MEMORY_MB: usize = 50;

struct TileCacheInner {
    tiles: HashMap<TileId, Arc<Tile>>,
    /// Sweep order; entries are removed on eviction, cursor adjusted in place
    sweep_list: Vec<TileId>,
    sweep: usize,
    bytes_used: usize,
}

pub struct TileCache {
    inner: Mutex<TileCacheInner>,
    max_bytes: AtomicUsize,
    stats: Arc<CacheStats>,
}

impl TileCache {
    pub fn new(stats: Arc<CacheStats>) -> Self {
        Self {
            inner: Mutex::new(TileCacheInner {
                tiles: HashMap::new(),
                sweep_list: Vec::new(),
                sweep: 0,
                bytes_used: 0,
            }),
            max_bytes: AtomicUsize::new(DEFAULT_MAX_MEMORY_MB << 20),
            stats,
        }
    }

    /// Look up or load the tile for `id`
    ///
    /// `file` must be the entry `id.file` refers to. The returned tile may
    /// be invalid if the read failed; it is cached either way so retries
    /// are bounded by eviction.
    pub fn find_or_load(&self, file: &TextureFile, id: TileId) -> Arc<Tile> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tile) = inner.tiles.get(&id) {
            tile.mark_used();
            self.stats.tile_hit();
            return tile.clone();
        }

        self.check_max_memory(&mut inner);
        self.stats.tile_miss();

        let tile = Arc::new(Tile::load(file, id));
        inner.bytes_used += tile.bytes();
        inner.tiles.insert(id, tile.clone());
        inner.sweep_list.push(id);
        log::trace!(
            "cached tile {:?}, {} bytes in cache",
            id,
            inner.bytes_used
        );
        tile
    }

    /// CLOCK sweep: evict cold tiles until cached bytes are under budget
    fn check_max_memory(&self, inner: &mut TileCacheInner) {
        let max = self.max_bytes.load(Ordering::Acquire);
        while inner.bytes_used >= max {
            if inner.sweep_list.is_empty() {
                break;
            }
            if inner.sweep >= inner.sweep_list.len() {
                inner.sweep = 0;
            }
            let id = inner.sweep_list[inner.sweep];
            let hot = inner
                .tiles
                .get(&id)
                .map(|tile| tile.clear_used())
                .unwrap_or(false);
            if hot {
                inner.sweep += 1;
            } else {
                if let Some(tile) = inner.tiles.remove(&id) {
                    inner.bytes_used -= tile.bytes();
                    self.stats.tile_evicted();
                }
                // Removing at the cursor shifts the next entry into place
                inner.sweep_list.remove(inner.sweep);
            }
        }
    }

    pub fn set_max_memory_mb(&self, mb: usize) {
        self.max_bytes.store(mb << 20, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn set_max_memory_bytes(&self, bytes: usize) {
        self.max_bytes.store(bytes, Ordering::Release);
    }

    /// Bytes of all cached tile buffers
    pub fn bytes_used(&self) -> usize {
        self.inner.lock().unwrap().bytes_used
    }

    /// Number of cached tiles
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
