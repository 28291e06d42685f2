//! Per-file texture entity
//!
//! One `TextureFile` exists per distinct filename for the lifetime of the
//! system. The underlying reader is opened lazily, may be closed by the
//! registry sweep while the metadata stays resident, and is reopened
//! transparently on the next tile read. A file that fails to open is marked
//! broken and never retried.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use glam::Mat4;

use crate::core::{Error, Result};
use crate::imageio::{create_reader, ImageReader, ImageSpec, ParamValue};
use crate::texture::format::{parse_wrap_modes, CubeLayout, TexFormat, Wrap};

/// Registry-assigned identity of a texture file, stable for the system's
/// lifetime; tile ids key on it
pub type FileId = u32;

/// Metadata parsed once on the first successful open, immutable after
struct TexMeta {
    specs: Vec<ImageSpec>,
    texformat: TexFormat,
    swrap: Wrap,
    twrap: Wrap,
    cube_layout: CubeLayout,
    y_up: bool,
    /// common-to-world * worldtocamera, when the file carries the attribute
    local: Option<Mat4>,
    /// common-to-world * worldtoscreen
    proj: Option<Mat4>,
}

pub struct TextureFile {
    id: FileId,
    filename: String,
    /// Search path snapshot taken when the file was first referenced
    search_path: String,
    common_to_world: Mat4,
    used: AtomicBool,
    broken: AtomicBool,
    meta: OnceLock<TexMeta>,
    /// The reader and its cursor state; `None` while closed
    reader: Mutex<Option<Box<dyn ImageReader>>>,
    /// Registry's open-file count, shared so `release` needs no back-pointer
    open_files: Arc<AtomicUsize>,
}

impl TextureFile {
    pub(crate) fn new(
        id: FileId,
        filename: &str,
        search_path: &str,
        common_to_world: Mat4,
        open_files: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            id,
            filename: filename.to_string(),
            search_path: search_path.to_string(),
            common_to_world,
            used: AtomicBool::new(true),
            broken: AtomicBool::new(false),
            meta: OnceLock::new(),
            reader: Mutex::new(None),
            open_files,
        }
    }

    /// Open the underlying reader; idempotent
    ///
    /// The first successful open walks every subimage, validates that all
    /// levels share a channel count, and parses the texture metadata. Any
    /// failure marks the file broken, and broken files fail without retry.
    pub fn open(&self) -> Result<()> {
        let mut slot = self.reader.lock().unwrap();
        self.open_locked(&mut slot)
    }

    fn open_locked(&self, slot: &mut Option<Box<dyn ImageReader>>) -> Result<()> {
        if slot.is_some() {
            return Ok(());
        }
        if self.broken() {
            return Err(Error::Broken(self.filename.clone()));
        }

        let Some(mut reader) = create_reader(&self.filename, &self.search_path) else {
            self.broken.store(true, Ordering::Release);
            return Err(Error::UnknownFormat(self.filename.clone()));
        };
        let first = match reader.open() {
            Ok(spec) => spec,
            Err(e) => {
                self.broken.store(true, Ordering::Release);
                return Err(Error::Open(self.filename.clone(), e.to_string()));
            }
        };
        self.open_files.fetch_add(1, Ordering::AcqRel);
        self.mark_used();

        if self.meta.get().is_none() {
            match self.read_meta(reader.as_mut(), first) {
                Ok(meta) => {
                    let _ = self.meta.set(meta);
                }
                Err(e) => {
                    reader.close();
                    self.open_files.fetch_sub(1, Ordering::AcqRel);
                    self.broken.store(true, Ordering::Release);
                    return Err(e);
                }
            }
        }
        *slot = Some(reader);
        log::debug!("opened texture \"{}\"", self.filename);
        Ok(())
    }

    /// First-open subimage walk and metadata parse
    fn read_meta(&self, reader: &mut dyn ImageReader, first: ImageSpec) -> Result<TexMeta> {
        let mut specs = vec![first];
        while let Some(spec) = reader.seek_subimage(specs.len())? {
            if spec.nchannels != specs[0].nchannels {
                return Err(Error::Open(
                    self.filename.clone(),
                    format!(
                        "subimage {} has {} channels, level 0 has {}",
                        specs.len(),
                        spec.nchannels,
                        specs[0].nchannels
                    ),
                ));
            }
            specs.push(spec);
        }
        log::debug!("\"{}\" has {} MIP levels", self.filename, specs.len());

        let spec = &specs[0];
        let mut texformat = TexFormat::Texture;
        if let Some(ParamValue::Str(name)) = spec.find_attribute("textureformat") {
            if let Some(decoded) = TexFormat::decode(name) {
                texformat = decoded;
            }
        }

        // The file's declared wrap pair never stays Default: unset or
        // unrecognized modes resolve to Black
        let (mut swrap, mut twrap) = (Wrap::Black, Wrap::Black);
        if let Some(ParamValue::Str(modes)) = spec.find_attribute("wrapmodes") {
            let (s, t) = parse_wrap_modes(modes);
            swrap = if s == Wrap::Default { Wrap::Black } else { s };
            twrap = if t == Wrap::Default { Wrap::Black } else { t };
        }

        let mut cube_layout = CubeLayout::Unknown;
        let mut y_up = false;
        if texformat == TexFormat::CubeFaceEnv {
            if reader.format_name() == "openexr" {
                y_up = true;
            }
            let w = spec.full_width.max(spec.tile_width);
            let h = spec.full_height.max(spec.tile_height);
            if spec.width == 3 * w && spec.height == 2 * h {
                cube_layout = CubeLayout::ThreeByTwo;
            } else if spec.width == w && spec.height == 6 * h {
                cube_layout = CubeLayout::OneBySix;
            }
        }

        let local = match spec.find_attribute("worldtocamera") {
            Some(ParamValue::Matrix(m)) => Some(self.common_to_world * *m),
            _ => None,
        };
        let proj = match spec.find_attribute("worldtoscreen") {
            Some(ParamValue::Matrix(m)) => Some(self.common_to_world * *m),
            _ => None,
        };

        Ok(TexMeta {
            specs,
            texformat,
            swrap,
            twrap,
            cube_layout,
            y_up,
            local,
            proj,
        })
    }

    /// Read the tile at tile-aligned `(x, y, z)` of `level` into `out`
    ///
    /// Reopens the reader if the registry sweep closed it.
    pub fn read_tile(&self, level: usize, x: i32, y: i32, z: i32, out: &mut [f32]) -> Result<()> {
        let mut slot = self.reader.lock().unwrap();
        self.open_locked(&mut slot)?;
        let reader = slot
            .as_mut()
            .ok_or_else(|| Error::Broken(self.filename.clone()))?;
        if reader.current_subimage() != level {
            reader.seek_subimage(level)?.ok_or_else(|| {
                Error::Read(format!("\"{}\" has no MIP level {}", self.filename, level))
            })?;
        }
        reader.read_tile(x, y, z, out)
    }

    /// Two-phase closer driven by the registry's CLOCK sweep
    ///
    /// A recently used file gets a grace pass: the first call only clears
    /// the used bit, the second closes the reader and gives back the open
    /// slot. Metadata is retained either way.
    pub fn release(&self) {
        if self.used.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut slot = self.reader.lock().unwrap();
        if let Some(mut reader) = slot.take() {
            reader.close();
            self.open_files.fetch_sub(1, Ordering::AcqRel);
            log::trace!("closed texture \"{}\"", self.filename);
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    pub fn opened(&self) -> bool {
        self.reader.lock().unwrap().is_some()
    }

    /// Set the used bit; called on every access so the sweep spares hot files
    pub fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    /// Spec of one MIP level; `None` until the first successful open
    pub fn spec(&self, level: usize) -> Option<&ImageSpec> {
        self.meta.get().and_then(|m| m.specs.get(level))
    }

    /// Number of MIP levels, zero until the first successful open
    pub fn levels(&self) -> usize {
        self.meta.get().map_or(0, |m| m.specs.len())
    }

    pub fn texture_format(&self) -> TexFormat {
        self.meta.get().map_or(TexFormat::Unknown, |m| m.texformat)
    }

    pub fn swrap(&self) -> Wrap {
        self.meta.get().map_or(Wrap::Black, |m| m.swrap)
    }

    pub fn twrap(&self) -> Wrap {
        self.meta.get().map_or(Wrap::Black, |m| m.twrap)
    }

    pub fn cube_layout(&self) -> CubeLayout {
        self.meta.get().map_or(CubeLayout::Unknown, |m| m.cube_layout)
    }

    pub fn y_up(&self) -> bool {
        self.meta.get().is_some_and(|m| m.y_up)
    }

    /// Derived local (viewing) matrix, when the file declared one
    pub fn local_matrix(&self) -> Option<Mat4> {
        self.meta.get().and_then(|m| m.local)
    }

    /// Derived projection matrix, when the file declared one
    pub fn proj_matrix(&self) -> Option<Mat4> {
        self.meta.get().and_then(|m| m.proj)
    }
}
