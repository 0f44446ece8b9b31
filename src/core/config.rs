//! Level preparation configuration.
//!
//! All values are in world units unless noted. Every section has sensible
//! defaults so a config file only needs to list the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Full configuration for a level load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Culling grid layout.
    pub grid: GridConfig,
    /// Batch budgets.
    pub batch: BatchConfig,
    /// Static light baking.
    pub lighting: LightingConfig,
    /// Spatial index construction.
    pub octree: OctreeConfig,
}

impl BakeConfig {
    /// Load a config from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: BakeConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.grid.cell_size > 0.0) {
            return Err(Error::Config(format!("grid.cell_size must be positive, got {}", self.grid.cell_size)));
        }
        if self.grid.group_size == Some(0) {
            return Err(Error::Config("grid.group_size must be at least 1".into()));
        }
        if self.grid.close_radius < 0.0 {
            return Err(Error::Config("grid.close_radius must not be negative".into()));
        }
        if self.batch.max_textures_per_batch == 0 {
            return Err(Error::Config("batch.max_textures_per_batch must be at least 1".into()));
        }
        if self.batch.max_verts_per_batch == 0 {
            return Err(Error::Config("batch.max_verts_per_batch must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.lighting.occlusion_factor) {
            return Err(Error::Config("lighting.occlusion_factor must be within 0..=1".into()));
        }
        if self.octree.leaf_capacity == 0 {
            return Err(Error::Config("octree.leaf_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Culling grid layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of a base cell.
    pub cell_size: f32,
    /// Base cells per layer cell edge. `None` disables layer grouping.
    pub group_size: Option<u32>,
    /// Far plane distance of the close frustum.
    pub close_radius: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 4000.0,
            group_size: Some(4),
            close_radius: 8000.0,
        }
    }
}

/// Budgets that bound a single GPU batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Layers available in one texture array.
    pub max_textures_per_batch: u32,
    /// Vertex (and index) budget of one batch's buffers.
    pub max_verts_per_batch: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_textures_per_batch: 256,
            max_verts_per_batch: 1 << 20,
        }
    }
}

/// Static light baking parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Half-extent of the point box used for light lookups, also added to light boxes.
    pub light_tolerance: f32,
    /// How far below a point the ground face search reaches.
    pub ground_search_distance: f32,
    /// A hit closer than this fraction of the light distance occludes the light.
    pub occlusion_factor: f32,
    /// Linear color given to instances no static light reaches.
    pub fallback_light_color: [f32; 3],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            light_tolerance: 1.0,
            ground_search_distance: 5000.0,
            occlusion_factor: 0.85,
            fallback_light_color: [0.0, 0.0, 0.0],
        }
    }
}

/// Octree construction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Maximum subdivision depth.
    pub max_depth: u32,
    /// Entries a node holds before it splits.
    pub leaf_capacity: usize,
    /// Build large subtrees on the rayon pool.
    pub parallel: bool,
    /// Minimum entries in a node before its children are built in parallel.
    pub parallel_threshold: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            leaf_capacity: 16,
            parallel: true,
            parallel_threshold: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BakeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BakeConfig =
            serde_json::from_str(r#"{ "batch": { "max_textures_per_batch": 64 } }"#).unwrap();
        assert_eq!(config.batch.max_textures_per_batch, 64);
        assert_eq!(config.batch.max_verts_per_batch, BatchConfig::default().max_verts_per_batch);
        assert_eq!(config.grid, GridConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BakeConfig::default();
        config.grid.cell_size = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = BakeConfig::default();
        config.grid.group_size = Some(0);
        assert!(config.validate().is_err());

        let mut config = BakeConfig::default();
        config.lighting.occlusion_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bake.json");

        let mut config = BakeConfig::default();
        config.grid.group_size = None;
        config.lighting.fallback_light_color = [1.0, 0.0, 1.0];
        config.save(&path).unwrap();

        let loaded = BakeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "grid": { "cell_size": -1.0 } }"#).unwrap();
        assert!(matches!(BakeConfig::load(&path), Err(Error::Config(_))));
    }
}
