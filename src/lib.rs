//! Texcache - tile-cached filtered texture sampling for offline renderers

pub mod core;
pub mod imageio;
pub mod texture;

pub use texture::system::TextureSystem;
pub use texture::options::{TextureOptions, VaryingRef};
