//! Level loading: parsed input, placed objects and the level session.

pub mod geometry;
pub mod input;
pub mod instance;
pub mod session;
pub mod vob;

pub use input::{LevelInput, LightInput, MeshAsset, VobNode, WorldMeshInput};
pub use instance::StaticInstance;
pub use session::{BatchDraw, FrameDrawList, LevelSession, LoadStats};
