//! Pure sampling math: coordinate splits, wrap policies, MIP selection

use glam::Vec2;

use crate::texture::format::Wrap;

/// Split a texel-space coordinate into its integer floor and fraction
pub fn floor_frac(x: f32) -> (i64, f32) {
    let f = x.floor();
    (f as i64, x - f)
}

/// Wrap an integer texel index into `[0, n)`, or `None` for a black tap
///
/// `Default` must have been resolved to a concrete mode before this point.
pub fn wrap_texel(i: i64, n: i32, mode: Wrap) -> Option<i32> {
    let n64 = n as i64;
    match mode {
        Wrap::Black => (0..n64).contains(&i).then_some(i as i32),
        Wrap::Clamp => Some(i.clamp(0, n64 - 1) as i32),
        Wrap::Periodic => Some(i.rem_euclid(n64) as i32),
        Wrap::Mirror => {
            // Triangle wave with period 2n
            let m = i.rem_euclid(2 * n64);
            Some(if m < n64 { m } else { 2 * n64 - 1 - m } as i32)
        }
        Wrap::Default => None,
    }
}

/// Whether a Black-wrapped normalized coordinate discards the whole lane
pub fn black_out_of_range(coord: f32, mode: Wrap) -> bool {
    mode == Wrap::Black && !(0.0..1.0).contains(&coord)
}

/// Continuous MIP level from the footprint Jacobian
///
/// The derivatives are in normalized texture space; scaling by the level-0
/// resolution puts the footprint in texel units. Returns the clamped base
/// level and the fraction toward the next coarser level.
pub fn select_level(
    dsdx: f32,
    dtdx: f32,
    dsdy: f32,
    dtdy: f32,
    width0: f32,
    height0: f32,
    bias: f32,
    levels: usize,
) -> (usize, f32) {
    let vx = Vec2::new(dsdx * width0, dtdx * height0);
    let vy = Vec2::new(dsdy * width0, dtdy * height0);
    let len_minor = vx.length().min(vy.length());
    if len_minor <= 0.0 || levels <= 1 {
        return (0, 0.0);
    }
    let level = (len_minor.log2() + bias).clamp(0.0, (levels - 1) as f32);
    let base = level.floor();
    (base as usize, level - base)
}

/// The four bilinear taps around texel-space `(s, t)`: integer columns and
/// rows with their weights
pub struct BilinearTaps {
    pub cols: [(i64, f32); 2],
    pub rows: [(i64, f32); 2],
}

/// Bilinear footprint of normalized `(s, t)` over a `w` x `h` level
pub fn bilinear_taps(s: f32, t: f32, w: i32, h: i32) -> BilinearTaps {
    let (si, sf) = floor_frac(s * w as f32 - 0.5);
    let (ti, tf) = floor_frac(t * h as f32 - 0.5);
    BilinearTaps {
        cols: [(si, 1.0 - sf), (si + 1, sf)],
        rows: [(ti, 1.0 - tf), (ti + 1, tf)],
    }
}
