//! Batch sampling options and per-lane varying references

use crate::texture::format::Wrap;

static DEFAULT_BLUR: f32 = 0.0;
static DEFAULT_WIDTH: f32 = 1.0;
static DEFAULT_BIAS: f32 = 0.0;
static DEFAULT_FILL: f32 = 0.0;

/// Per-lane view over batch data
///
/// A stride of zero makes the reference uniform: every lane reads the same
/// value. A stride of one indexes per-lane storage.
#[derive(Clone, Copy)]
pub struct VaryingRef<'a, T> {
    data: &'a [T],
    stride: usize,
}

impl<'a, T: Copy> VaryingRef<'a, T> {
    /// One value shared by all lanes
    pub fn uniform(value: &'a T) -> Self {
        Self {
            data: std::slice::from_ref(value),
            stride: 0,
        }
    }

    /// One value per lane
    pub fn varying(data: &'a [T]) -> Self {
        Self { data, stride: 1 }
    }

    pub fn get(&self, lane: usize) -> T {
        self.data[lane * self.stride]
    }

    pub fn is_varying(&self) -> bool {
        self.stride != 0
    }
}

/// Options for one `texture()` batch
///
/// Per-lane quantities are varying references so a uniform batch costs one
/// value. `alpha`, when present, receives the channel immediately after the
/// last requested color channel; it must cover every lane index the batch
/// touches.
pub struct TextureOptions<'a> {
    /// First file channel to return
    pub first_channel: usize,
    /// Number of channels to write per lane
    pub nchannels: usize,
    pub swrap: Wrap,
    pub twrap: Wrap,
    pub sblur: VaryingRef<'a, f32>,
    pub tblur: VaryingRef<'a, f32>,
    pub swidth: VaryingRef<'a, f32>,
    pub twidth: VaryingRef<'a, f32>,
    /// MIP level bias
    pub bias: VaryingRef<'a, f32>,
    /// Value written for missing data
    pub fill: VaryingRef<'a, f32>,
    /// Optional per-lane alpha output
    pub alpha: Option<&'a mut [f32]>,
    /// Channels actually present in the file; set during batch setup
    pub(crate) actual_channels: usize,
}

impl<'a> TextureOptions<'a> {
    /// Options with uniform defaults: no blur, unit width, zero bias and fill
    pub fn new(first_channel: usize, nchannels: usize) -> Self {
        Self {
            first_channel,
            nchannels,
            swrap: Wrap::Default,
            twrap: Wrap::Default,
            sblur: VaryingRef::uniform(&DEFAULT_BLUR),
            tblur: VaryingRef::uniform(&DEFAULT_BLUR),
            swidth: VaryingRef::uniform(&DEFAULT_WIDTH),
            twidth: VaryingRef::uniform(&DEFAULT_WIDTH),
            bias: VaryingRef::uniform(&DEFAULT_BIAS),
            fill: VaryingRef::uniform(&DEFAULT_FILL),
            alpha: None,
            actual_channels: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_ref() {
        let v = 3.5f32;
        let r = VaryingRef::uniform(&v);
        assert!(!r.is_varying());
        assert_eq!(r.get(0), 3.5);
        assert_eq!(r.get(17), 3.5);
    }

    #[test]
    fn test_varying_ref() {
        let data = [1.0f32, 2.0, 3.0];
        let r = VaryingRef::varying(&data);
        assert!(r.is_varying());
        assert_eq!(r.get(0), 1.0);
        assert_eq!(r.get(2), 3.0);
    }

    #[test]
    fn test_default_options() {
        let opt = TextureOptions::new(0, 3);
        assert_eq!(opt.first_channel, 0);
        assert_eq!(opt.nchannels, 3);
        assert_eq!(opt.swrap, Wrap::Default);
        assert_eq!(opt.twrap, Wrap::Default);
        assert_eq!(opt.swidth.get(5), 1.0);
        assert_eq!(opt.fill.get(5), 0.0);
        assert!(opt.alpha.is_none());
    }
}
