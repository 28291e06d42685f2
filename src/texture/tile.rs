//! Tile identity and decoded tile payload

use std::sync::atomic::{AtomicBool, Ordering};

use crate::texture::file::{FileId, TextureFile};

/// Identity of one decoded tile: file, MIP level, and tile-aligned origin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileId {
    pub file: FileId,
    pub level: usize,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TileId {
    pub fn new(file: FileId, level: usize, x: i32, y: i32, z: i32) -> Self {
        Self { file, level, x, y, z }
    }
}

/// One decoded tile: channel-interleaved f32 texels
///
/// The buffer is immutable after load and may be read lock-free through a
/// shared reference. A tile that failed to read stays in the cache with
/// `valid == false` so repeated failing taps are bounded by eviction rather
/// than retried per tap.
pub struct Tile {
    id: TileId,
    texels: Vec<f32>,
    channels: usize,
    tile_width: i32,
    tile_height: i32,
    valid: bool,
    used: AtomicBool,
    /// Min and max of the depth channel, kept for shadow-format files
    depth_range: Option<(f32, f32)>,
}

impl Tile {
    /// Read the tile through its file; never fails, but may yield an
    /// invalid tile
    pub fn load(file: &TextureFile, id: TileId) -> Self {
        let Some(spec) = file.spec(id.level) else {
            // No metadata means the file never opened; an empty invalid
            // tile occupies no budget
            return Self {
                id,
                texels: Vec::new(),
                channels: 0,
                tile_width: 0,
                tile_height: 0,
                valid: false,
                used: AtomicBool::new(true),
                depth_range: None,
            };
        };
        debug_assert!(id.x % spec.tile_width == 0 && id.y % spec.tile_height == 0);

        let channels = spec.nchannels;
        let mut texels = vec![0.0f32; spec.tile_pixels() * channels];
        let valid = match file.read_tile(id.level, id.x, id.y, id.z, &mut texels) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("tile read failed for \"{}\" {:?}: {}", file.filename(), id, e);
                false
            }
        };

        let depth_range = if valid && file.texture_format().is_shadow() {
            let mut lo = f32::INFINITY;
            let mut hi = f32::NEG_INFINITY;
            for v in texels.iter().step_by(channels) {
                lo = lo.min(*v);
                hi = hi.max(*v);
            }
            Some((lo, hi))
        } else {
            None
        };

        Self {
            id,
            texels,
            channels,
            tile_width: spec.tile_width,
            tile_height: spec.tile_height,
            valid,
            used: AtomicBool::new(true),
            depth_range,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn data(&self) -> &[f32] {
        &self.texels
    }

    /// Texel channels at image coords `(x, y)`, which must fall inside this
    /// tile
    pub fn texel(&self, x: i32, y: i32) -> &[f32] {
        let sx = x & (self.tile_width - 1);
        let sy = y & (self.tile_height - 1);
        let offset = (sy * self.tile_width + sx) as usize * self.channels;
        &self.texels[offset..offset + self.channels]
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Bytes held by the texel buffer
    pub fn bytes(&self) -> usize {
        self.texels.len() * std::mem::size_of::<f32>()
    }

    pub fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    /// Clear the used bit, returning whether it was set; the sweep's first
    /// pass over a hot tile
    pub fn clear_used(&self) -> bool {
        self.used.swap(false, Ordering::AcqRel)
    }

    pub fn depth_range(&self) -> Option<(f32, f32)> {
        self.depth_range
    }
}
