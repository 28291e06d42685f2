//! Tile-cached texture sampling
//!
//! The core of the crate: per-file records with lazily opened readers
//! ([`file`]), decoded tiles and their cache ([`tile`], [`tilecache`]), the
//! bounded open-file pool ([`registry`]), and the batch sampling facade
//! ([`system`]). Both resource pools use a second-chance CLOCK sweep: a
//! per-entry used bit set on access, cleared on the sweep's first visit,
//! and the entry released on the second.

pub mod format;
pub mod file;
pub mod tile;
pub mod registry;
pub mod tilecache;
pub mod stats;
pub mod options;
pub mod lookup;
pub mod system;

pub use format::{CubeLayout, TexFormat, Wrap};
pub use file::{FileId, TextureFile};
pub use tile::{Tile, TileId};
pub use registry::FileRegistry;
pub use tilecache::TileCache;
pub use stats::{CacheStats, StatsSnapshot};
pub use options::{TextureOptions, VaryingRef};
pub use system::TextureSystem;
