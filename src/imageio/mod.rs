//! Image I/O collaborator surface
//!
//! The tile cache reads texture data exclusively through the [`ImageReader`]
//! trait defined here; any format-specific knowledge lives behind it. This
//! module also defines the per-subimage [`ImageSpec`] and the typed metadata
//! values surfaced through `TextureSystem::get_texture_info`.

pub mod reader;
pub mod tiled;

pub use reader::{create_reader, ImageReader};

use glam::Mat4;

/// Native storage type of a subimage's texels
///
/// The cache always requests `f32` tiles; readers convert from their native
/// type on read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
    UInt8,
    UInt16,
    Float32,
}

impl PixelType {
    /// Size of one channel value in bytes
    pub fn size(&self) -> usize {
        match self {
            PixelType::UInt8 => 1,
            PixelType::UInt16 => 2,
            PixelType::Float32 => 4,
        }
    }
}

/// Requested type of a metadata query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// `n` integers
    Int(usize),
    /// `n` floats
    Float(usize),
    Str,
    /// 4x4 matrix
    Matrix,
}

/// A typed metadata value attached to a subimage
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Str(String),
    Matrix(Mat4),
}

impl ParamValue {
    /// Whether this value matches the requested type exactly
    pub fn matches(&self, ty: ParamType) -> bool {
        match (self, ty) {
            (ParamValue::Int(v), ParamType::Int(n)) => v.len() == n,
            (ParamValue::Float(v), ParamType::Float(n)) => v.len() == n,
            (ParamValue::Str(_), ParamType::Str) => true,
            (ParamValue::Matrix(_), ParamType::Matrix) => true,
            _ => false,
        }
    }
}

/// Geometry and metadata of one subimage (MIP level)
#[derive(Clone, Debug)]
pub struct ImageSpec {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    /// Display-window width; differs from `width` for cube-face layouts
    pub full_width: i32,
    pub full_height: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub tile_depth: i32,
    pub nchannels: usize,
    pub pixel_type: PixelType,
    pub attributes: Vec<(String, ParamValue)>,
}

impl ImageSpec {
    /// A minimal 2D spec covering the whole image with a single tile
    pub fn new_2d(width: i32, height: i32, nchannels: usize, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            depth: 1,
            full_width: width,
            full_height: height,
            tile_width: width,
            tile_height: height,
            tile_depth: 1,
            nchannels,
            pixel_type,
            attributes: Vec::new(),
        }
    }

    /// Number of pixels in one tile
    pub fn tile_pixels(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize * self.tile_depth as usize
    }

    /// Bytes of one decoded (f32) tile
    pub fn tile_bytes(&self) -> usize {
        self.tile_pixels() * self.nchannels * std::mem::size_of::<f32>()
    }

    /// Bytes of one tile in the file's native pixel type
    pub fn native_tile_bytes(&self) -> usize {
        self.tile_pixels() * self.nchannels * self.pixel_type.size()
    }

    /// Number of tiles along each axis
    pub fn tile_counts(&self) -> (i32, i32, i32) {
        let div_up = |a: i32, b: i32| (a + b - 1) / b;
        (
            div_up(self.width, self.tile_width),
            div_up(self.height, self.tile_height),
            div_up(self.depth, self.tile_depth),
        )
    }

    /// Look up a metadata attribute by name
    pub fn find_attribute(&self, name: &str) -> Option<&ParamValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Add or replace a metadata attribute
    pub fn set_attribute(&mut self, name: &str, value: ParamValue) {
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name.to_string(), value));
        }
    }
}
