//! Base-color textures: sources, the per-level cache and texture arrays.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::types::Result;

/// Pixel formats a texture array can hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        4
    }

    pub fn bytes_per_row(self, width: u32) -> u32 {
        width * self.bytes_per_pixel()
    }

    /// Byte size of one mip level
    pub fn level_size(self, width: u32, height: u32) -> usize {
        self.bytes_per_row(width) as usize * height as usize
    }

    /// Same format reinterpreted without sRGB decoding, where that exists
    pub fn to_linear(self) -> Self {
        match self {
            Self::Rgba8UnormSrgb => Self::Rgba8Unorm,
            other => other,
        }
    }
}

/// Everything that must match for two textures to share an array
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureLayout {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
}

impl TextureLayout {
    /// Size of mip level `level`
    pub fn mip_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Bytes of one full mip chain
    pub fn layer_size(&self) -> usize {
        (0..self.mip_count)
            .map(|level| {
                let (w, h) = self.mip_extent(level);
                self.format.level_size(w, h)
            })
            .sum()
    }
}

/// Number of levels in a full mip chain
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Decoded texture with all mip levels
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    /// Upper-cased texture name
    pub name: String,
    pub layout: TextureLayout,
    /// Level 0 first
    pub mips: Vec<Vec<u8>>,
}

impl TextureData {
    /// RGBA8 texture with a box filtered mip chain
    pub fn from_rgba8(name: &str, width: u32, height: u32, pixels: Vec<u8>, srgb: bool) -> Result<Self> {
        if width == 0 || height == 0 || pixels.len() != (width * height * 4) as usize {
            return Err(Error::Texture {
                name: name.to_string(),
                reason: format!("{} bytes do not describe a {}x{} RGBA8 image", pixels.len(), width, height),
            });
        }

        let mip_count = full_mip_count(width, height);
        let mut mips = Vec::with_capacity(mip_count as usize);
        mips.push(pixels);
        let (mut w, mut h) = (width, height);
        for _ in 1..mip_count {
            let next = downsample_rgba8(&mips[mips.len() - 1], w, h);
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            mips.push(next);
        }

        let format = if srgb { PixelFormat::Rgba8UnormSrgb } else { PixelFormat::Rgba8Unorm };
        Ok(Self {
            name: name.to_uppercase(),
            layout: TextureLayout { format, width, height, mip_count },
            mips,
        })
    }

    /// Single color texture
    pub fn solid(name: &str, width: u32, height: u32, color: [u8; 4]) -> Result<Self> {
        let pixels = color.repeat((width * height) as usize);
        Self::from_rgba8(name, width, height, pixels, true)
    }

    pub fn byte_size(&self) -> usize {
        self.mips.iter().map(Vec::len).sum()
    }
}

/// Halve an RGBA8 image with a 2x2 box filter. Odd edges reuse the last
/// row or column.
fn downsample_rgba8(src: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = ((width / 2).max(1), (height / 2).max(1));
    let mut out = Vec::with_capacity((w * h * 4) as usize);
    let texel = |x: u32, y: u32, c: u32| -> u32 {
        let x = x.min(width - 1);
        let y = y.min(height - 1);
        src[((y * width + x) * 4 + c) as usize] as u32
    };
    for y in 0..h {
        for x in 0..w {
            for c in 0..4 {
                let sum = texel(2 * x, 2 * y, c)
                    + texel(2 * x + 1, 2 * y, c)
                    + texel(2 * x, 2 * y + 1, c)
                    + texel(2 * x + 1, 2 * y + 1, c);
                out.push(((sum + 2) / 4) as u8);
            }
        }
    }
    out
}

/// Provides texture data by name.
pub trait TextureSource {
    fn load(&self, name: &str) -> Result<TextureData>;
}

/// Loads image files from a directory.
///
/// Texture names are matched by file stem, ignoring case and extension, so
/// `STONE.TGA` finds `stone.png`.
pub struct ImageTextureSource {
    root: PathBuf,
    files: HashMap<String, PathBuf>,
}

impl ImageTextureSource {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = HashMap::new();
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.insert(stem.to_uppercase(), path);
            }
        }
        log::info!("Found {} texture files in {}", files.len(), root.display());
        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn texture_stem(name: &str) -> String {
    let upper = name.to_uppercase();
    match Path::new(&upper).file_stem().and_then(|s| s.to_str()) {
        Some(stem) => stem.to_string(),
        None => upper,
    }
}

impl TextureSource for ImageTextureSource {
    fn load(&self, name: &str) -> Result<TextureData> {
        let path = self.files.get(&texture_stem(name)).ok_or_else(|| Error::Texture {
            name: name.to_string(),
            reason: format!("no matching file in {}", self.root.display()),
        })?;

        let img = image::open(path).map_err(|e| Error::Texture {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Loaded texture {} ({}x{}) from {:?}", name, width, height, path);

        TextureData::from_rgba8(name, width, height, rgba.into_raw(), true)
    }
}

/// In-memory textures, keyed by upper-cased name.
#[derive(Clone, Default)]
pub struct MemoryTextureSource {
    textures: HashMap<String, TextureData>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: TextureData) {
        self.textures.insert(texture.name.to_uppercase(), texture);
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureSource for MemoryTextureSource {
    fn load(&self, name: &str) -> Result<TextureData> {
        self.textures
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| Error::Texture {
                name: name.to_string(),
                reason: "not in memory source".into(),
            })
    }
}

/// Textures loaded during one level load.
///
/// Owned by the level session and cleared once batching is done; the texture
/// arrays keep their own references.
pub struct TextureCache {
    source: Box<dyn TextureSource>,
    entries: HashMap<(String, bool), Arc<TextureData>>,
}

impl TextureCache {
    pub fn new(source: Box<dyn TextureSource>) -> Self {
        Self { source, entries: HashMap::new() }
    }

    /// Texture `name`, loaded on first use. Non-sRGB materials get the
    /// linear variant of the format, cached separately from the sRGB one.
    pub fn get(&mut self, name: &str, srgb: bool) -> Result<Arc<TextureData>> {
        let key = (name.to_uppercase(), srgb);
        if let Some(texture) = self.entries.get(&key) {
            return Ok(Arc::clone(texture));
        }

        let mut texture = self.source.load(&key.0)?;
        texture.name = key.0.clone();
        if !srgb {
            texture.layout.format = texture.layout.format.to_linear();
        }
        let texture = Arc::new(texture);
        self.entries.insert(key, Arc::clone(&texture));
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        log::debug!("Clearing texture cache ({} entries)", self.entries.len());
        self.entries.clear();
    }
}

/// Textures of one batch, one layer each, all with the same layout.
#[derive(Debug)]
pub struct TextureArray {
    pub layout: TextureLayout,
    layers: Vec<Arc<TextureData>>,
}

impl TextureArray {
    pub fn new(layout: TextureLayout, layers: Vec<Arc<TextureData>>) -> Result<Self> {
        if let Some(bad) = layers.iter().find(|t| t.layout != layout) {
            return Err(Error::Texture {
                name: bad.name.clone(),
                reason: format!("layout {:?} does not match array layout {:?}", bad.layout, layout),
            });
        }
        Ok(Self { layout, layers })
    }

    /// Layer holding texture `name`
    pub fn layer_of(&self, name: &str) -> Option<u32> {
        self.layers.iter().position(|t| t.name == name).map(|i| i as u32)
    }

    pub fn layers(&self) -> &[Arc<TextureData>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.layers.iter().map(|t| t.byte_size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(256, 256), 9);
        assert_eq!(full_mip_count(256, 64), 9);
        assert_eq!(full_mip_count(5, 3), 3);
    }

    #[test]
    fn test_mip_chain_sizes() {
        let tex = TextureData::solid("grass", 8, 4, [10, 20, 30, 255]).unwrap();
        assert_eq!(tex.name, "GRASS");
        assert_eq!(tex.layout.mip_count, 4);
        let sizes: Vec<usize> = tex.mips.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![8 * 4 * 4, 4 * 2 * 4, 2 * 4, 4]);
        assert_eq!(tex.byte_size(), tex.layout.layer_size());
        // Box filter of a solid color keeps the color
        assert_eq!(&tex.mips[3][..], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_box_filter_averages() {
        let pixels = vec![
            0, 0, 0, 0, 255, 255, 255, 255, //
            255, 255, 255, 255, 0, 0, 0, 0,
        ];
        let tex = TextureData::from_rgba8("checker", 2, 2, pixels, false).unwrap();
        assert_eq!(tex.layout.format, PixelFormat::Rgba8Unorm);
        assert_eq!(tex.mips[1], vec![128, 128, 128, 128]);
    }

    #[test]
    fn test_rejects_bad_pixel_count() {
        let err = TextureData::from_rgba8("bad", 4, 4, vec![0; 10], true).unwrap_err();
        assert!(matches!(err, Error::Texture { .. }));
    }

    #[test]
    fn test_level_sizes() {
        assert_eq!(PixelFormat::Rgba8Unorm.bytes_per_row(3), 12);
        assert_eq!(PixelFormat::Rgba8UnormSrgb.level_size(4, 2), 32);
        assert_eq!(PixelFormat::Rgba8UnormSrgb.to_linear(), PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn test_cache_loads_once_and_clears() {
        let mut source = MemoryTextureSource::new();
        source.insert(TextureData::solid("STONE", 4, 4, [1, 2, 3, 4]).unwrap());
        let mut cache = TextureCache::new(Box::new(source));

        let a = cache.get("stone", true).unwrap();
        let b = cache.get("Stone", true).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        // Arrays may still hold loaded textures
        assert_eq!(a.name, "STONE");
    }

    #[test]
    fn test_cache_linear_variant() {
        let mut source = MemoryTextureSource::new();
        source.insert(TextureData::solid("SKY", 4, 4, [0; 4]).unwrap());
        let mut cache = TextureCache::new(Box::new(source));
        let tex = cache.get("SKY", false).unwrap();
        assert_eq!(tex.layout.format, PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn test_cache_keeps_both_color_spaces() {
        let mut source = MemoryTextureSource::new();
        source.insert(TextureData::solid("GLASS", 4, 4, [9; 4]).unwrap());
        let mut cache = TextureCache::new(Box::new(source));

        let srgb = cache.get("glass", true).unwrap();
        let linear = cache.get("GLASS", false).unwrap();
        assert_eq!(srgb.layout.format, PixelFormat::Rgba8UnormSrgb);
        assert_eq!(linear.layout.format, PixelFormat::Rgba8Unorm);
        assert_eq!(cache.len(), 2);

        // Order does not matter, each flag gets its own entry
        assert!(Arc::ptr_eq(&srgb, &cache.get("Glass", true).unwrap()));
        assert_eq!(cache.get("glass", false).unwrap().layout.format, PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn test_missing_texture_is_error() {
        let mut cache = TextureCache::new(Box::new(MemoryTextureSource::new()));
        match cache.get("nope", true) {
            Err(Error::Texture { name, .. }) => assert_eq!(name, "NOPE"),
            other => panic!("expected texture error, got {:?}", other.map(|t| t.name.clone())),
        }
    }

    #[test]
    fn test_image_source_matches_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([200, 100, 50, 255]));
        img.save(dir.path().join("wall_01.png")).unwrap();

        let source = ImageTextureSource::new(dir.path()).unwrap();
        let tex = source.load("WALL_01.TGA").unwrap();
        assert_eq!(tex.layout.width, 4);
        assert_eq!(tex.layout.height, 2);
        assert_eq!(tex.layout.format, PixelFormat::Rgba8UnormSrgb);
        assert_eq!(&tex.mips[0][..4], &[200, 100, 50, 255]);

        assert!(matches!(source.load("MISSING"), Err(Error::Texture { .. })));
    }

    #[test]
    fn test_array_rejects_mixed_layouts() {
        let a = Arc::new(TextureData::solid("A", 4, 4, [0; 4]).unwrap());
        let b = Arc::new(TextureData::solid("B", 8, 8, [0; 4]).unwrap());
        assert!(TextureArray::new(a.layout, vec![a.clone(), b]).is_err());

        let c = Arc::new(TextureData::solid("C", 4, 4, [0; 4]).unwrap());
        let array = TextureArray::new(a.layout, vec![a, c]).unwrap();
        assert_eq!(array.layer_of("C"), Some(1));
        assert_eq!(array.layer_of("B"), None);
    }
}
