//! Texture format, cube layout, and wrap mode enumerations
//!
//! The string names here are wire-visible: they round-trip through file
//! metadata and `get_texture_info`, so the tables must stay in declaration
//! order and matching is case-sensitive.

/// Declared format of a texture file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexFormat {
    Unknown,
    Texture,
    VolumeTexture,
    Shadow,
    CubeFaceShadow,
    VolumeShadow,
    LatLongEnv,
    CubeFaceEnv,
}

/// Metadata names, in `TexFormat` declaration order
pub const TEXTURE_FORMAT_NAMES: [&str; 8] = [
    "unknown",
    "Plain Texture",
    "Volume Texture",
    "Shadow",
    "CubeFace Shadow",
    "Volume Shadow",
    "LatLong Environment",
    "CubeFace Environment",
];

/// Broad type names, in `TexFormat` declaration order
pub const TEXTURE_TYPE_NAMES: [&str; 8] = [
    "unknown",
    "Plain Texture",
    "Volume Texture",
    "Shadow",
    "Shadow",
    "Shadow",
    "Environment",
    "Environment",
];

impl TexFormat {
    const ALL: [TexFormat; 8] = [
        TexFormat::Unknown,
        TexFormat::Texture,
        TexFormat::VolumeTexture,
        TexFormat::Shadow,
        TexFormat::CubeFaceShadow,
        TexFormat::VolumeShadow,
        TexFormat::LatLongEnv,
        TexFormat::CubeFaceEnv,
    ];

    /// Decode a `textureformat` metadata string; unmatched names keep the
    /// plain-texture default
    pub fn decode(name: &str) -> Option<TexFormat> {
        Self::ALL
            .iter()
            .zip(TEXTURE_FORMAT_NAMES.iter())
            .find(|(_, n)| **n == name)
            .map(|(f, _)| *f)
    }

    /// Wire name of this format
    pub fn format_name(&self) -> &'static str {
        TEXTURE_FORMAT_NAMES[*self as usize]
    }

    /// Wire name of this format's broad type
    pub fn type_name(&self) -> &'static str {
        TEXTURE_TYPE_NAMES[*self as usize]
    }

    pub fn is_shadow(&self) -> bool {
        matches!(
            self,
            TexFormat::Shadow | TexFormat::CubeFaceShadow | TexFormat::VolumeShadow
        )
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, TexFormat::LatLongEnv | TexFormat::CubeFaceEnv)
    }
}

/// Arrangement of the six faces of a cube-face environment map
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeLayout {
    ThreeByTwo,
    OneBySix,
    Unknown,
}

/// Coordinate wrap policy outside `[0,1)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    /// Use the wrap declared by the file
    Default,
    Black,
    Clamp,
    Periodic,
    Mirror,
}

/// Wrap names, in `Wrap` declaration order
pub const WRAP_NAMES: [&str; 5] = ["default", "black", "clamp", "periodic", "mirror"];

/// Decode a single wrap name; unknown strings yield `Default`
pub fn decode_wrap_mode(name: &str) -> Wrap {
    const ALL: [Wrap; 5] = [
        Wrap::Default,
        Wrap::Black,
        Wrap::Clamp,
        Wrap::Periodic,
        Wrap::Mirror,
    ];
    ALL.iter()
        .zip(WRAP_NAMES.iter())
        .find(|(_, n)| **n == name)
        .map(|(w, _)| *w)
        .unwrap_or(Wrap::Default)
}

/// Parse a `wrapmodes` metadata string of the form `"mode"` or `"smode,tmode"`
pub fn parse_wrap_modes(wrapmodes: &str) -> (Wrap, Wrap) {
    match wrapmodes.split_once(',') {
        Some((s, t)) => (decode_wrap_mode(s), decode_wrap_mode(t)),
        None => {
            let w = decode_wrap_mode(wrapmodes);
            (w, w)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decode() {
        assert_eq!(TexFormat::decode("Plain Texture"), Some(TexFormat::Texture));
        assert_eq!(
            TexFormat::decode("CubeFace Environment"),
            Some(TexFormat::CubeFaceEnv)
        );
        assert_eq!(TexFormat::decode("unknown"), Some(TexFormat::Unknown));
        // Case-sensitive
        assert_eq!(TexFormat::decode("plain texture"), None);
        assert_eq!(TexFormat::decode("Bogus"), None);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(TexFormat::Shadow.format_name(), "Shadow");
        assert_eq!(TexFormat::CubeFaceShadow.format_name(), "CubeFace Shadow");
        assert_eq!(TexFormat::CubeFaceShadow.type_name(), "Shadow");
        assert_eq!(TexFormat::LatLongEnv.type_name(), "Environment");
        assert_eq!(TexFormat::Texture.type_name(), "Plain Texture");
    }

    #[test]
    fn test_format_groups() {
        assert!(TexFormat::VolumeShadow.is_shadow());
        assert!(!TexFormat::Texture.is_shadow());
        assert!(TexFormat::CubeFaceEnv.is_environment());
        assert!(!TexFormat::Shadow.is_environment());
    }

    #[test]
    fn test_decode_wrap_mode() {
        assert_eq!(decode_wrap_mode("black"), Wrap::Black);
        assert_eq!(decode_wrap_mode("clamp"), Wrap::Clamp);
        assert_eq!(decode_wrap_mode("periodic"), Wrap::Periodic);
        assert_eq!(decode_wrap_mode("mirror"), Wrap::Mirror);
        assert_eq!(decode_wrap_mode("default"), Wrap::Default);
        // Unknown and wrong-case strings fall back to Default
        assert_eq!(decode_wrap_mode("Black"), Wrap::Default);
        assert_eq!(decode_wrap_mode("repeat"), Wrap::Default);
    }

    #[test]
    fn test_parse_wrap_modes() {
        assert_eq!(parse_wrap_modes("periodic"), (Wrap::Periodic, Wrap::Periodic));
        assert_eq!(parse_wrap_modes("clamp,mirror"), (Wrap::Clamp, Wrap::Mirror));
        assert_eq!(parse_wrap_modes("black,"), (Wrap::Black, Wrap::Default));
    }
}
