//! Image reader trait and reader construction
//!
//! One reader instance is exclusive to its texture file; the file's own lock
//! serializes access to it (`read_tile` mutates the current-subimage cursor).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::imageio::{tiled, ImageSpec};

/// Format-specific image reader
///
/// The only I/O surface the tile cache sees. Readers hand out per-subimage
/// specs and tile-aligned texel blocks converted to `f32`.
pub trait ImageReader: Send {
    /// Short lowercase name of the underlying format, e.g. `"tiled"`
    fn format_name(&self) -> &'static str;

    /// Open the file and return the first subimage's spec
    fn open(&mut self) -> Result<ImageSpec>;

    /// Seek to subimage `index`, returning its spec, or `None` past the end
    fn seek_subimage(&mut self, index: usize) -> Result<Option<ImageSpec>>;

    /// Index of the subimage the reader is currently positioned at
    fn current_subimage(&self) -> usize;

    /// Read the tile whose origin is `(x, y, z)` into `out`, converted to f32
    ///
    /// Coordinates must be tile-aligned. `out` must hold
    /// `tile_pixels() * nchannels` values for the current subimage.
    fn read_tile(&mut self, x: i32, y: i32, z: i32, out: &mut [f32]) -> Result<()>;

    /// Close the underlying file handle; the reader may be reopened later
    fn close(&mut self);
}

/// Resolve `filename` against a colon-separated search path
///
/// An absolute path, or a path that exists relative to the working
/// directory, wins; otherwise each search-path entry is tried in order.
pub fn resolve_path(filename: &str, search_path: &str) -> Option<PathBuf> {
    let direct = Path::new(filename);
    if direct.exists() {
        return Some(direct.to_path_buf());
    }
    if direct.is_absolute() {
        return None;
    }
    for dir in search_path.split(':').filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Construct a reader for `filename`, or `None` if no format matches
///
/// Resolution failures and unrecognized containers both yield `None`; the
/// caller marks the owning texture file broken.
pub fn create_reader(filename: &str, search_path: &str) -> Option<Box<dyn ImageReader>> {
    let path = resolve_path(filename, search_path)?;
    let magic = read_magic(&path)?;
    if magic == tiled::MAGIC {
        return Some(Box::new(tiled::TiledReader::new(path)));
    }
    log::debug!("no reader recognizes {:?}", path);
    None
}

fn read_magic(path: &Path) -> Option<[u8; 4]> {
    let mut file = File::open(path).ok()?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).ok()?;
    Some(magic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("texcache_reader_tests").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_resolve_direct_path() {
        let dir = temp_dir("direct");
        let path = dir.join("a.bin");
        std::fs::write(&path, b"x").unwrap();

        let resolved = resolve_path(path.to_str().unwrap(), "");
        assert_eq!(resolved, Some(path));
    }

    #[test]
    fn test_resolve_search_path() {
        let dir = temp_dir("searched");
        std::fs::write(dir.join("tex.bin"), b"x").unwrap();

        let sp = format!("/nonexistent:{}", dir.display());
        let resolved = resolve_path("tex.bin", &sp);
        assert_eq!(resolved, Some(dir.join("tex.bin")));
        assert_eq!(resolve_path("missing.bin", &sp), None);
    }

    #[test]
    fn test_create_reader_rejects_unknown_magic() {
        let dir = temp_dir("magic");
        let path = dir.join("bogus.txr");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"NOPE and then some").unwrap();

        assert!(create_reader(path.to_str().unwrap(), "").is_none());
    }

    #[test]
    fn test_create_reader_missing_file() {
        assert!(create_reader("does-not-exist.txr", "").is_none());
    }
}
