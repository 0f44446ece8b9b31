//! Materials and the per-level material intern table.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// How a material blends with what is already drawn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Opaque,
    Additive,
    Multiply,
    AlphaBlend,
    FactorBlend,
}

/// Base-color texture plus blend state.
///
/// Two materials are equal when texture and blend mode match; the color-space
/// flag rides along with the first material interned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Material {
    /// Texture name, upper-cased so lookups are case-insensitive
    pub texture: String,
    pub blend: BlendMode,
    /// Texture data is in sRGB space
    #[serde(default = "default_srgb")]
    pub srgb: bool,
}

fn default_srgb() -> bool {
    true
}

impl Material {
    pub fn new(texture: impl AsRef<str>, blend: BlendMode) -> Self {
        Self {
            texture: texture.as_ref().to_uppercase(),
            blend,
            srgb: true,
        }
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.texture == other.texture && self.blend == other.blend
    }
}

impl Eq for Material {}

impl Hash for Material {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.texture.hash(state);
        self.blend.hash(state);
    }
}

/// Stable handle to an interned material
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Assigns stable ids to materials for the lifetime of a level.
#[derive(Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    lookup: HashMap<Material, MaterialId>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `material`, inserting it on first use.
    pub fn intern(&mut self, material: Material) -> MaterialId {
        if let Some(&id) = self.lookup.get(&material) {
            return id;
        }
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material.clone());
        self.lookup.insert(material, id);
        id
    }

    pub fn get(&self, id: MaterialId) -> &Material {
        &self.materials[id.0 as usize]
    }

    pub fn find(&self, material: &Material) -> Option<MaterialId> {
        self.lookup.get(material).copied()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, m)| (MaterialId(i as u32), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut table = MaterialTable::new();
        let a = table.intern(Material::new("stone.tga", BlendMode::Opaque));
        let b = table.intern(Material::new("grass.tga", BlendMode::AlphaBlend));
        let a2 = table.intern(Material::new("STONE.TGA", BlendMode::Opaque));

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b).texture, "GRASS.TGA");
    }

    #[test]
    fn test_blend_mode_distinguishes_materials() {
        let mut table = MaterialTable::new();
        let opaque = table.intern(Material::new("water.tga", BlendMode::Opaque));
        let blended = table.intern(Material::new("water.tga", BlendMode::AlphaBlend));
        assert_ne!(opaque, blended);
        assert_eq!(table.get(blended).blend, BlendMode::AlphaBlend);
    }

    #[test]
    fn test_color_space_flag_ignored_for_identity() {
        let mut table = MaterialTable::new();
        let mut linear = Material::new("mask.tga", BlendMode::Opaque);
        linear.srgb = false;
        let id = table.intern(linear);
        assert_eq!(table.find(&Material::new("mask.tga", BlendMode::Opaque)), Some(id));
        assert!(!table.get(id).srgb);
    }
}
