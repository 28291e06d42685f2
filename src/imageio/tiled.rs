//! Tiled texture container
//!
//! A simple seekable on-disk format used to exercise the cache end to end:
//! a magic/version preamble, an lz4-compressed rkyv header describing every
//! subimage, then fixed-size uncompressed tile payloads addressable by a
//! single seek. Edge tiles are stored padded to full tile size so the
//! per-tile offset stays a pure multiply.
//!
//! The writer is fixture tooling (tests and benches author files with it);
//! it performs no MIP generation or image processing.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use glam::Mat4;
use rkyv::{Archive, Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::imageio::{ImageReader, ImageSpec, ParamValue, PixelType};

/// Container magic, first four bytes of every file
pub const MAGIC: [u8; 4] = *b"TXTL";
const VERSION: u32 = 1;

/// Serializable metadata value
#[derive(Archive, Deserialize, Serialize)]
enum AttrData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Str(String),
    Matrix([f32; 16]),
}

#[derive(Archive, Deserialize, Serialize)]
struct AttrEntry {
    name: String,
    value: AttrData,
}

/// Serializable subimage description
///
/// `data_offset` is relative to the start of the payload region, which
/// begins immediately after the compressed header.
#[derive(Archive, Deserialize, Serialize)]
struct SubimageData {
    width: i32,
    height: i32,
    depth: i32,
    full_width: i32,
    full_height: i32,
    tile_width: i32,
    tile_height: i32,
    tile_depth: i32,
    nchannels: u32,
    pixel_type: u8,
    attrs: Vec<AttrEntry>,
    data_offset: u64,
}

#[derive(Archive, Deserialize, Serialize)]
struct HeaderData {
    subimages: Vec<SubimageData>,
}

fn pixel_type_tag(ty: PixelType) -> u8 {
    match ty {
        PixelType::UInt8 => 0,
        PixelType::UInt16 => 1,
        PixelType::Float32 => 2,
    }
}

fn pixel_type_from_tag(tag: u8) -> Result<PixelType> {
    match tag {
        0 => Ok(PixelType::UInt8),
        1 => Ok(PixelType::UInt16),
        2 => Ok(PixelType::Float32),
        other => Err(Error::Container(format!("bad pixel type tag {}", other))),
    }
}

fn attr_to_wire(value: &ParamValue) -> AttrData {
    match value {
        ParamValue::Int(v) => AttrData::Int(v.clone()),
        ParamValue::Float(v) => AttrData::Float(v.clone()),
        ParamValue::Str(s) => AttrData::Str(s.clone()),
        ParamValue::Matrix(m) => AttrData::Matrix(m.to_cols_array()),
    }
}

fn attr_from_wire(value: &AttrData) -> ParamValue {
    match value {
        AttrData::Int(v) => ParamValue::Int(v.clone()),
        AttrData::Float(v) => ParamValue::Float(v.clone()),
        AttrData::Str(s) => ParamValue::Str(s.clone()),
        AttrData::Matrix(m) => ParamValue::Matrix(Mat4::from_cols_array(m)),
    }
}

fn spec_to_wire(spec: &ImageSpec, data_offset: u64) -> SubimageData {
    SubimageData {
        width: spec.width,
        height: spec.height,
        depth: spec.depth,
        full_width: spec.full_width,
        full_height: spec.full_height,
        tile_width: spec.tile_width,
        tile_height: spec.tile_height,
        tile_depth: spec.tile_depth,
        nchannels: spec.nchannels as u32,
        pixel_type: pixel_type_tag(spec.pixel_type),
        attrs: spec
            .attributes
            .iter()
            .map(|(name, value)| AttrEntry {
                name: name.clone(),
                value: attr_to_wire(value),
            })
            .collect(),
        data_offset,
    }
}

fn spec_from_wire(sub: &SubimageData) -> Result<ImageSpec> {
    Ok(ImageSpec {
        width: sub.width,
        height: sub.height,
        depth: sub.depth,
        full_width: sub.full_width,
        full_height: sub.full_height,
        tile_width: sub.tile_width,
        tile_height: sub.tile_height,
        tile_depth: sub.tile_depth,
        nchannels: sub.nchannels as usize,
        pixel_type: pixel_type_from_tag(sub.pixel_type)?,
        attributes: sub
            .attrs
            .iter()
            .map(|a| (a.name.clone(), attr_from_wire(&a.value)))
            .collect(),
    })
}

fn validate_spec(spec: &ImageSpec) -> Result<()> {
    let pow2 = |v: i32| v > 0 && (v as u32).is_power_of_two();
    if !pow2(spec.tile_width) || !pow2(spec.tile_height) || !pow2(spec.tile_depth) {
        return Err(Error::Container(format!(
            "tile dims {}x{}x{} must be powers of two",
            spec.tile_width, spec.tile_height, spec.tile_depth
        )));
    }
    if spec.width <= 0 || spec.height <= 0 || spec.depth <= 0 || spec.nchannels == 0 {
        return Err(Error::Container("empty subimage".to_string()));
    }
    Ok(())
}

/// Write a texture container
///
/// Each entry is one subimage (MIP level): its spec plus the full-resolution
/// channel-interleaved f32 plane, `width * height * depth * nchannels`
/// values, row-major. Data is quantized to the spec's declared pixel type.
pub fn write_texture(path: &Path, subimages: &[(ImageSpec, &[f32])]) -> Result<()> {
    if subimages.is_empty() {
        return Err(Error::Container("no subimages".to_string()));
    }

    // Payload layout: per-subimage tile regions in order, relative offsets
    let mut offset = 0u64;
    let mut wire = Vec::with_capacity(subimages.len());
    for (spec, data) in subimages {
        validate_spec(spec)?;
        let expect = spec.width as usize
            * spec.height as usize
            * spec.depth as usize
            * spec.nchannels;
        if data.len() != expect {
            return Err(Error::Container(format!(
                "subimage data has {} values, expected {}",
                data.len(),
                expect
            )));
        }
        wire.push(spec_to_wire(spec, offset));
        let (tx, ty, tz) = spec.tile_counts();
        offset += (tx * ty * tz) as u64 * spec.native_tile_bytes() as u64;
    }

    let header = HeaderData { subimages: wire };
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&header)
        .map_err(|e| Error::Container(e.to_string()))?;
    let compressed = lz4_flex::compress_prepend_size(&bytes);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(&MAGIC)?;
    file.write_all(&VERSION.to_le_bytes())?;
    file.write_all(&(compressed.len() as u32).to_le_bytes())?;
    file.write_all(&compressed)?;

    for (spec, data) in subimages {
        write_subimage_tiles(&mut file, spec, data)?;
    }
    Ok(())
}

fn write_subimage_tiles(file: &mut File, spec: &ImageSpec, data: &[f32]) -> Result<()> {
    let (tx, ty, tz) = spec.tile_counts();
    let tw = spec.tile_width as usize;
    let th = spec.tile_height as usize;
    let td = spec.tile_depth as usize;
    let nch = spec.nchannels;
    let mut tile = vec![0.0f32; spec.tile_pixels() * nch];

    for iz in 0..tz {
        for iy in 0..ty {
            for ix in 0..tx {
                tile.iter_mut().for_each(|v| *v = 0.0);
                let x0 = ix as usize * tw;
                let y0 = iy as usize * th;
                let z0 = iz as usize * td;
                // Copy the covered region row by row; edge tiles stay padded
                for lz in 0..td.min(spec.depth as usize - z0) {
                    for ly in 0..th.min(spec.height as usize - y0) {
                        let run = tw.min(spec.width as usize - x0);
                        let src = (((z0 + lz) * spec.height as usize + y0 + ly)
                            * spec.width as usize
                            + x0)
                            * nch;
                        let dst = ((lz * th + ly) * tw) * nch;
                        tile[dst..dst + run * nch]
                            .copy_from_slice(&data[src..src + run * nch]);
                    }
                }
                write_native(file, spec.pixel_type, &tile)?;
            }
        }
    }
    Ok(())
}

fn write_native(file: &mut File, ty: PixelType, tile: &[f32]) -> Result<()> {
    match ty {
        PixelType::Float32 => file.write_all(bytemuck::cast_slice(tile))?,
        PixelType::UInt8 => {
            let quantized: Vec<u8> = tile
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect();
            file.write_all(&quantized)?;
        }
        PixelType::UInt16 => {
            let quantized: Vec<u8> = tile
                .iter()
                .flat_map(|v| {
                    (((v.clamp(0.0, 1.0) * 65535.0).round() as u16).to_le_bytes()).into_iter()
                })
                .collect();
            file.write_all(&quantized)?;
        }
    }
    Ok(())
}

/// Reader for the tiled container format
pub struct TiledReader {
    path: PathBuf,
    file: Option<File>,
    specs: Vec<ImageSpec>,
    offsets: Vec<u64>,
    payload_base: u64,
    current: usize,
}

impl TiledReader {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            specs: Vec::new(),
            offsets: Vec::new(),
            payload_base: 0,
            current: 0,
        }
    }

    fn read_u32(file: &mut File) -> Result<u32> {
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn parse_header(&mut self, file: &mut File) -> Result<()> {
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::Container("bad magic".to_string()));
        }
        let version = Self::read_u32(file)?;
        if version != VERSION {
            return Err(Error::Container(format!("unsupported version {}", version)));
        }
        let header_len = Self::read_u32(file)? as usize;
        let mut compressed = vec![0u8; header_len];
        file.read_exact(&mut compressed)?;
        self.payload_base = file.stream_position()?;

        let bytes = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| Error::Container(format!("header decompression failed: {}", e)))?;
        let archived = rkyv::access::<ArchivedHeaderData, rkyv::rancor::Error>(&bytes)
            .map_err(|e| Error::Container(e.to_string()))?;
        let header: HeaderData =
            rkyv::deserialize::<HeaderData, rkyv::rancor::Error>(archived)
                .map_err(|e| Error::Container(e.to_string()))?;

        if header.subimages.is_empty() {
            return Err(Error::Container("no subimages".to_string()));
        }
        self.specs = header
            .subimages
            .iter()
            .map(spec_from_wire)
            .collect::<Result<Vec<_>>>()?;
        self.offsets = header.subimages.iter().map(|s| s.data_offset).collect();
        Ok(())
    }
}

impl ImageReader for TiledReader {
    fn format_name(&self) -> &'static str {
        "tiled"
    }

    fn open(&mut self) -> Result<ImageSpec> {
        let mut file = File::open(&self.path)?;
        if self.specs.is_empty() {
            self.parse_header(&mut file)?;
        }
        self.file = Some(file);
        self.current = 0;
        Ok(self.specs[0].clone())
    }

    fn seek_subimage(&mut self, index: usize) -> Result<Option<ImageSpec>> {
        if index >= self.specs.len() {
            return Ok(None);
        }
        self.current = index;
        Ok(Some(self.specs[index].clone()))
    }

    fn current_subimage(&self) -> usize {
        self.current
    }

    fn read_tile(&mut self, x: i32, y: i32, z: i32, out: &mut [f32]) -> Result<()> {
        let spec = &self.specs[self.current];
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::Read("reader is not open".to_string()))?;

        if x % spec.tile_width != 0 || y % spec.tile_height != 0 || z % spec.tile_depth != 0 {
            return Err(Error::Read(format!("tile origin ({},{},{}) not aligned", x, y, z)));
        }
        if x < 0 || x >= spec.width || y < 0 || y >= spec.height || z < 0 || z >= spec.depth {
            return Err(Error::Read(format!("tile origin ({},{},{}) out of range", x, y, z)));
        }
        let values = spec.tile_pixels() * spec.nchannels;
        if out.len() < values {
            return Err(Error::Read("output buffer too small".to_string()));
        }

        let (tx, ty, _tz) = spec.tile_counts();
        let index = ((z / spec.tile_depth) * ty + y / spec.tile_height) * tx + x / spec.tile_width;
        let offset = self.payload_base
            + self.offsets[self.current]
            + index as u64 * spec.native_tile_bytes() as u64;

        file.seek(SeekFrom::Start(offset))?;
        let mut native = vec![0u8; spec.native_tile_bytes()];
        file.read_exact(&mut native)?;

        match spec.pixel_type {
            PixelType::Float32 => {
                let decoded: Vec<f32> = bytemuck::pod_collect_to_vec(&native);
                out[..values].copy_from_slice(&decoded);
            }
            PixelType::UInt8 => {
                for (dst, src) in out[..values].iter_mut().zip(native.iter()) {
                    *dst = *src as f32 / 255.0;
                }
            }
            PixelType::UInt16 => {
                for (dst, src) in out[..values].iter_mut().zip(native.chunks_exact(2)) {
                    *dst = u16::from_le_bytes([src[0], src[1]]) as f32 / 65535.0;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imageio::ParamType;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("texcache_tiled_tests")
            .join(name)
    }

    fn gradient(spec: &ImageSpec) -> Vec<f32> {
        let n = spec.width as usize * spec.height as usize * spec.depth as usize * spec.nchannels;
        (0..n).map(|i| i as f32 / n as f32).collect()
    }

    #[test]
    fn test_roundtrip_float() {
        let mut spec = ImageSpec::new_2d(8, 8, 3, PixelType::Float32);
        spec.tile_width = 4;
        spec.tile_height = 4;
        let data = gradient(&spec);
        let path = temp_path("roundtrip_f32.txr");
        write_texture(&path, &[(spec.clone(), &data)]).unwrap();

        let mut reader = TiledReader::new(path);
        let got = reader.open().unwrap();
        assert_eq!(got.width, 8);
        assert_eq!(got.tile_width, 4);
        assert_eq!(got.nchannels, 3);
        assert_eq!(got.pixel_type, PixelType::Float32);

        // Tile at (4, 4): rows 4..8, cols 4..8
        let mut tile = vec![0.0f32; 4 * 4 * 3];
        reader.read_tile(4, 4, 0, &mut tile).unwrap();
        for ly in 0..4 {
            for lx in 0..4 {
                for c in 0..3 {
                    let src = (((ly + 4) * 8) + lx + 4) * 3 + c;
                    assert_eq!(tile[(ly * 4 + lx) * 3 + c], data[src]);
                }
            }
        }
    }

    #[test]
    fn test_roundtrip_uint8_quantization() {
        let mut spec = ImageSpec::new_2d(4, 4, 1, PixelType::UInt8);
        spec.tile_width = 4;
        spec.tile_height = 4;
        let data = vec![0.5f32; 16];
        let path = temp_path("roundtrip_u8.txr");
        write_texture(&path, &[(spec, &data)]).unwrap();

        let mut reader = TiledReader::new(path);
        reader.open().unwrap();
        let mut tile = vec![0.0f32; 16];
        reader.read_tile(0, 0, 0, &mut tile).unwrap();
        for v in tile {
            assert!((v - 0.5).abs() < 1.0 / 255.0);
        }
    }

    #[test]
    fn test_multiple_subimages() {
        let mut spec0 = ImageSpec::new_2d(4, 4, 1, PixelType::Float32);
        spec0.tile_width = 4;
        spec0.tile_height = 4;
        let data0 = vec![0.25f32; 16];
        let mut spec1 = ImageSpec::new_2d(2, 2, 1, PixelType::Float32);
        spec1.tile_width = 2;
        spec1.tile_height = 2;
        let data1 = vec![0.75f32; 4];

        let path = temp_path("mips.txr");
        write_texture(&path, &[(spec0, &data0), (spec1, &data1)]).unwrap();

        let mut reader = TiledReader::new(path);
        let first = reader.open().unwrap();
        assert_eq!(first.width, 4);
        assert_eq!(reader.current_subimage(), 0);

        let second = reader.seek_subimage(1).unwrap().unwrap();
        assert_eq!(second.width, 2);
        assert_eq!(reader.current_subimage(), 1);
        let mut tile = vec![0.0f32; 4];
        reader.read_tile(0, 0, 0, &mut tile).unwrap();
        assert_eq!(tile, vec![0.75; 4]);

        assert!(reader.seek_subimage(2).unwrap().is_none());
    }

    #[test]
    fn test_edge_tiles_padded() {
        // 6x6 image, 4x4 tiles: right/bottom tiles are partial
        let mut spec = ImageSpec::new_2d(6, 6, 1, PixelType::Float32);
        spec.tile_width = 4;
        spec.tile_height = 4;
        let data = vec![1.0f32; 36];
        let path = temp_path("edge.txr");
        write_texture(&path, &[(spec, &data)]).unwrap();

        let mut reader = TiledReader::new(path);
        reader.open().unwrap();
        let mut tile = vec![0.5f32; 16];
        reader.read_tile(4, 0, 0, &mut tile).unwrap();
        // Covered columns are 1.0, padding columns are 0.0
        assert_eq!(tile[0], 1.0);
        assert_eq!(tile[1], 1.0);
        assert_eq!(tile[2], 0.0);
        assert_eq!(tile[3], 0.0);
    }

    #[test]
    fn test_attributes_roundtrip() {
        let mut spec = ImageSpec::new_2d(4, 4, 1, PixelType::Float32);
        spec.tile_width = 4;
        spec.tile_height = 4;
        spec.set_attribute("textureformat", ParamValue::Str("Plain Texture".into()));
        spec.set_attribute("datawindow", ParamValue::Int(vec![0, 0, 3, 3]));
        spec.set_attribute("worldtocamera", ParamValue::Matrix(Mat4::from_scale(
            glam::Vec3::new(2.0, 2.0, 2.0),
        )));
        let data = vec![0.0f32; 16];
        let path = temp_path("attrs.txr");
        write_texture(&path, &[(spec, &data)]).unwrap();

        let mut reader = TiledReader::new(path);
        let got = reader.open().unwrap();
        assert_eq!(
            got.find_attribute("textureformat"),
            Some(&ParamValue::Str("Plain Texture".into()))
        );
        assert_eq!(
            got.find_attribute("datawindow"),
            Some(&ParamValue::Int(vec![0, 0, 3, 3]))
        );
        match got.find_attribute("worldtocamera") {
            Some(ParamValue::Matrix(m)) => assert_eq!(m.x_axis.x, 2.0),
            other => panic!("unexpected attribute {:?}", other),
        }
        assert!(got.find_attribute("worldtocamera").unwrap().matches(ParamType::Matrix));
    }

    #[test]
    fn test_rejects_non_pow2_tiles() {
        let mut spec = ImageSpec::new_2d(6, 6, 1, PixelType::Float32);
        spec.tile_width = 6;
        spec.tile_height = 6;
        let data = vec![0.0f32; 36];
        let path = temp_path("nonpow2.txr");
        assert!(write_texture(&path, &[(spec, &data)]).is_err());
    }

    #[test]
    fn test_unaligned_read_fails() {
        let mut spec = ImageSpec::new_2d(8, 8, 1, PixelType::Float32);
        spec.tile_width = 4;
        spec.tile_height = 4;
        let data = vec![0.0f32; 64];
        let path = temp_path("unaligned.txr");
        write_texture(&path, &[(spec, &data)]).unwrap();

        let mut reader = TiledReader::new(path);
        reader.open().unwrap();
        let mut tile = vec![0.0f32; 16];
        assert!(reader.read_tile(3, 0, 0, &mut tile).is_err());
        assert!(reader.read_tile(8, 0, 0, &mut tile).is_err());
    }

    #[test]
    fn test_read_after_close_fails_then_reopen() {
        let mut spec = ImageSpec::new_2d(4, 4, 1, PixelType::Float32);
        spec.tile_width = 4;
        spec.tile_height = 4;
        let data = vec![0.125f32; 16];
        let path = temp_path("reopen.txr");
        write_texture(&path, &[(spec, &data)]).unwrap();

        let mut reader = TiledReader::new(path);
        reader.open().unwrap();
        reader.close();
        let mut tile = vec![0.0f32; 16];
        assert!(reader.read_tile(0, 0, 0, &mut tile).is_err());

        reader.open().unwrap();
        reader.read_tile(0, 0, 0, &mut tile).unwrap();
        assert_eq!(tile[0], 0.125);
    }
}
