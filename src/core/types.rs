//! Core type aliases and re-exports

pub use glam::{Mat4, Vec2};

/// Standard Result type for the texture system
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
