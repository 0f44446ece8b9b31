//! Error types for level preparation

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent source data. Aborts the level load.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Texture '{name}' unavailable: {reason}")]
    Texture { name: String, reason: String },

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structural problems in parsed world data
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("world submesh {submesh} triangle {triangle} has no lightmap")]
    MissingLightmap { submesh: usize, triangle: usize },

    #[error("instance visual '{visual}' carries lightmap data")]
    UnexpectedLightmap { visual: String },

    #[error("{positions} positions but {attributes} attributes")]
    MisalignedVertices { positions: usize, attributes: usize },

    #[error("index {index} out of range for {vertex_count} vertices")]
    InvalidIndex { index: u32, vertex_count: usize },

    #[error("world bounds are empty or not finite")]
    DegenerateBounds,

    #[error("{width}x{height} grid cells of size {cell_size} exceed the addressable cell count")]
    GridTooLarge { width: i64, height: i64, cell_size: f32 },
}
