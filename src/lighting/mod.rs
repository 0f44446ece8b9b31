//! Static lighting baked into placed instances at load time.

pub mod color;
pub mod ground;
pub mod static_light;

pub use ground::{build_face_index, ground_face_at};
pub use static_light::{BakedLight, StaticLight, StaticLightResolver, build_light_index, light_at};
