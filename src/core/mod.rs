//! Core types, errors, configuration and logging

pub mod types;
pub mod error;
pub mod logging;
pub mod config;
pub mod camera;

pub use types::*;
pub use error::{Error, DataError};
pub use config::BakeConfig;
pub use camera::Camera;
