//! The shared texture system
//!
//! Owns the file registry and tile cache and exposes the batch sampling
//! surface. The split between `texture` and `texture_lookup` is load-bearing:
//! everything that is identical across a batch (file resolution, wrap
//! defaulting, channel clamping and fill, alpha disabling) happens once in
//! `texture`, and only per-point work lives in `texture_lookup`.

use std::sync::Arc;

use glam::Mat4;

use crate::imageio::{ParamType, ParamValue};
use crate::texture::file::TextureFile;
use crate::texture::format::Wrap;
use crate::texture::lookup::{bilinear_taps, black_out_of_range, select_level, wrap_texel};
use crate::texture::options::{TextureOptions, VaryingRef};
use crate::texture::registry::FileRegistry;
use crate::texture::stats::{CacheStats, StatsSnapshot};
use crate::texture::tile::{Tile, TileId};
use crate::texture::tilecache::TileCache;

/// Process-wide texture sampling service
///
/// Thread-safe; one instance is shared by every concurrent sampler. All
/// resources are released on drop.
pub struct TextureSystem {
    files: FileRegistry,
    tiles: TileCache,
    stats: Arc<CacheStats>,
}

impl TextureSystem {
    /// A system with default budgets: 100 open files, 50 MiB of tiles
    pub fn new() -> Self {
        let stats = Arc::new(CacheStats::new());
        Self {
            files: FileRegistry::new(stats.clone()),
            tiles: TileCache::new(stats.clone()),
            stats,
        }
    }

    /// Bound the number of concurrently open texture files
    pub fn set_max_open_files(&self, max: usize) {
        self.files.set_max_open_files(max);
    }

    /// Bound the bytes of cached decoded tiles
    pub fn set_max_memory_mb(&self, mb: usize) {
        self.tiles.set_max_memory_mb(mb);
    }

    /// Colon-separated directories searched for relative texture filenames
    pub fn set_search_path(&self, path: &str) {
        self.files.set_search_path(path);
    }

    /// Matrix combined with per-file `worldtocamera` / `worldtoscreen`
    /// metadata to derive the viewing and projection matrices
    pub fn set_common_to_world(&self, m: Mat4) {
        self.files.set_common_to_world(m);
    }

    pub fn common_to_world(&self) -> Mat4 {
        self.files.common_to_world()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Typed metadata query
    ///
    /// Documented names: `resolution` (two ints), `texturetype` (string),
    /// `textureformat` (string), `channels` (int or float), `viewingmatrix`
    /// and `projectionmatrix` (matrix). Any other name passes through to the
    /// file's attributes with an exact type-and-arity match; the one
    /// widening allowed is reading stored ints as floats. Returns `None` for
    /// missing or broken files and for type mismatches.
    pub fn get_texture_info(
        &self,
        filename: &str,
        dataname: &str,
        datatype: ParamType,
    ) -> Option<ParamValue> {
        let file = self.files.find_or_open(filename);
        if file.broken() {
            return None;
        }
        let spec = file.spec(0)?;

        match (dataname, datatype) {
            ("resolution", ParamType::Int(2)) => {
                return Some(ParamValue::Int(vec![spec.width, spec.height]));
            }
            ("texturetype", ParamType::Str) => {
                return Some(ParamValue::Str(file.texture_format().type_name().to_string()));
            }
            ("textureformat", ParamType::Str) => {
                return Some(ParamValue::Str(
                    file.texture_format().format_name().to_string(),
                ));
            }
            ("channels", ParamType::Int(1)) => {
                return Some(ParamValue::Int(vec![spec.nchannels as i32]));
            }
            ("channels", ParamType::Float(1)) => {
                return Some(ParamValue::Float(vec![spec.nchannels as f32]));
            }
            ("viewingmatrix", ParamType::Matrix) => {
                return file.local_matrix().map(ParamValue::Matrix);
            }
            ("projectionmatrix", ParamType::Matrix) => {
                return file.proj_matrix().map(ParamValue::Matrix);
            }
            _ => {}
        }

        let value = spec.find_attribute(dataname)?;
        if value.matches(datatype) {
            return Some(value.clone());
        }
        if let (ParamValue::Int(v), ParamType::Float(n)) = (value, datatype) {
            if v.len() == n {
                return Some(ParamValue::Float(v.iter().map(|&i| i as f32).collect()));
            }
        }
        None
    }

    /// Batch filtered texture lookup
    ///
    /// Processes lanes `first..=last` whose run flag is set. `result` holds
    /// `nchannels` values per lane, indexed by lane; `s`, `t` and the
    /// optional derivative arrays are addressable over the same window.
    /// Missing files, missing channels, and failed tile reads become the
    /// per-lane `fill`; no I/O error escapes this call.
    #[allow(clippy::too_many_arguments)]
    pub fn texture(
        &self,
        filename: &str,
        options: &mut TextureOptions,
        runflags: &[bool],
        first: usize,
        last: usize,
        s: VaryingRef<f32>,
        t: VaryingRef<f32>,
        dsdx: Option<VaryingRef<f32>>,
        dtdx: Option<VaryingRef<f32>>,
        dsdy: Option<VaryingRef<f32>>,
        dtdy: Option<VaryingRef<f32>>,
        result: &mut [f32],
    ) {
        let file = self.files.find_or_open(filename);
        if file.broken() || file.spec(0).is_none() {
            log::debug!("texture \"{}\" not found, filling batch", filename);
            fill_batch(options, runflags, first, last, result);
            return;
        }

        // Batch-invariant setup; nothing below this loop header may depend
        // on the lane index
        if options.swrap == Wrap::Default {
            options.swrap = file.swrap();
        }
        if options.twrap == Wrap::Default {
            options.twrap = file.twrap();
        }

        let nch = options.nchannels;
        let file_channels = match file.spec(0) {
            Some(spec) => spec.nchannels,
            None => 0,
        };
        options.actual_channels = file_channels
            .saturating_sub(options.first_channel)
            .min(nch);

        // Channels requested beyond the file get the fill value
        if options.actual_channels < nch {
            for i in first..=last {
                if runflags[i] {
                    let fill = options.fill.get(i);
                    for c in options.actual_channels..nch {
                        result[i * nch + c] = fill;
                    }
                }
            }
        }

        // Alpha is the channel after the last returned color; if the file
        // does not have one, satisfy the request with fill and disable
        // per-lane alpha writes
        let alpha_present =
            options.first_channel + options.actual_channels < file_channels;
        if !alpha_present {
            if let Some(alpha) = options.alpha.take() {
                for i in first..=last {
                    if runflags[i] {
                        alpha[i] = options.fill.get(i);
                    }
                }
            }
        }

        if options.actual_channels < 1 {
            return;
        }

        for i in first..=last {
            if runflags[i] {
                self.texture_lookup(&file, options, i, s, t, dsdx, dtdx, dsdy, dtdy, result);
            }
        }
    }

    /// One filtered lookup; only work that varies per lane belongs here
    #[allow(clippy::too_many_arguments)]
    fn texture_lookup(
        &self,
        file: &TextureFile,
        options: &mut TextureOptions,
        lane: usize,
        s: VaryingRef<f32>,
        t: VaryingRef<f32>,
        dsdx: Option<VaryingRef<f32>>,
        dtdx: Option<VaryingRef<f32>>,
        dsdy: Option<VaryingRef<f32>>,
        dtdy: Option<VaryingRef<f32>>,
        result: &mut [f32],
    ) {
        let nch = options.nchannels;
        let actual = options.actual_channels;
        let fill = options.fill.get(lane);
        let out = &mut result[lane * nch..lane * nch + actual];

        let sv = s.get(lane);
        let tv = t.get(lane);
        if black_out_of_range(sv, options.swrap) || black_out_of_range(tv, options.twrap) {
            for v in out.iter_mut() {
                *v = fill;
            }
            if let Some(alpha) = options.alpha.as_deref_mut() {
                alpha[lane] = 0.0;
            }
            return;
        }

        // Footprint derivatives widened by the lane's width and blur
        let swidth = options.swidth.get(lane);
        let twidth = options.twidth.get(lane);
        let sblur = options.sblur.get(lane);
        let tblur = options.tblur.get(lane);
        let deriv =
            |r: Option<VaryingRef<f32>>, width: f32, blur: f32| r.map_or(0.0, |r| r.get(lane) * width + blur);
        let dsdx = deriv(dsdx, swidth, sblur);
        let dtdx = deriv(dtdx, twidth, tblur);
        let dsdy = deriv(dsdy, swidth, sblur);
        let dtdy = deriv(dtdy, twidth, tblur);

        let Some(spec0) = file.spec(0) else {
            for v in out.iter_mut() {
                *v = fill;
            }
            return;
        };
        let (base, frac) = select_level(
            dsdx,
            dtdx,
            dsdy,
            dtdy,
            spec0.width as f32,
            spec0.height as f32,
            options.bias.get(lane),
            file.levels(),
        );

        for v in out.iter_mut() {
            *v = 0.0;
        }
        let mut alpha_acc = 0.0;
        let want_alpha = options.alpha.is_some();
        let mut last_tile = None;

        if frac > 0.0 {
            // The footprint straddles a MIP boundary: blend the two levels
            self.bilinear_probe(
                file, base, sv, tv, 1.0 - frac, options, fill, want_alpha, out, &mut alpha_acc,
                &mut last_tile,
            );
            self.bilinear_probe(
                file, base + 1, sv, tv, frac, options, fill, want_alpha, out, &mut alpha_acc,
                &mut last_tile,
            );
        } else {
            self.bilinear_probe(
                file, base, sv, tv, 1.0, options, fill, want_alpha, out, &mut alpha_acc,
                &mut last_tile,
            );
        }

        if want_alpha {
            if let Some(alpha) = options.alpha.as_deref_mut() {
                alpha[lane] = alpha_acc;
            }
        }
    }

    /// Accumulate one weighted bilinear probe of `level` into `out`
    ///
    /// The four taps may land in up to four tiles; each resolves through the
    /// cache. Black-wrapped or failed taps contribute the fill value with
    /// zero alpha.
    #[allow(clippy::too_many_arguments)]
    fn bilinear_probe(
        &self,
        file: &TextureFile,
        level: usize,
        s: f32,
        t: f32,
        weight: f32,
        options: &TextureOptions,
        fill: f32,
        want_alpha: bool,
        out: &mut [f32],
        alpha_acc: &mut f32,
        last_tile: &mut Option<(TileId, Arc<Tile>)>,
    ) {
        let Some(spec) = file.spec(level) else {
            for v in out.iter_mut() {
                *v += weight * fill;
            }
            return;
        };
        let taps = bilinear_taps(s, t, spec.width, spec.height);
        let alpha_channel = options.first_channel + out.len();

        for (row, wy) in taps.rows {
            for (col, wx) in taps.cols {
                let w = weight * wx * wy;
                if w == 0.0 {
                    continue;
                }
                let (Some(x), Some(y)) = (
                    wrap_texel(col, spec.width, options.swrap),
                    wrap_texel(row, spec.height, options.twrap),
                ) else {
                    for v in out.iter_mut() {
                        *v += w * fill;
                    }
                    continue;
                };

                let id = TileId::new(
                    file.id(),
                    level,
                    x & !(spec.tile_width - 1),
                    y & !(spec.tile_height - 1),
                    0,
                );
                let tile = match last_tile {
                    Some((last_id, tile)) if *last_id == id => tile.clone(),
                    _ => {
                        let tile = self.tiles.find_or_load(file, id);
                        *last_tile = Some((id, tile.clone()));
                        tile
                    }
                };
                if !tile.valid() {
                    for v in out.iter_mut() {
                        *v += w * fill;
                    }
                    continue;
                }

                let texel = tile.texel(x, y);
                for (c, v) in out.iter_mut().enumerate() {
                    *v += w * texel[options.first_channel + c];
                }
                if want_alpha {
                    *alpha_acc += w * texel[alpha_channel];
                }
            }
        }
    }
}

impl Default for TextureSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Write every active lane's channels (and alpha, if requested) to fill
fn fill_batch(
    options: &mut TextureOptions,
    runflags: &[bool],
    first: usize,
    last: usize,
    result: &mut [f32],
) {
    let nch = options.nchannels;
    for i in first..=last {
        if !runflags[i] {
            continue;
        }
        let fill = options.fill.get(i);
        for c in 0..nch {
            result[i * nch + c] = fill;
        }
        if let Some(alpha) = options.alpha.as_deref_mut() {
            alpha[i] = fill;
        }
    }
}
