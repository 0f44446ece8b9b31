//! Geometric primitives shared by the index, the resolvers and the grid

pub mod aabb;
pub mod ray;
pub mod frustum;
pub mod triangle;

pub use aabb::Aabb;
pub use ray::Ray;
pub use frustum::{Containment, Frustum, Plane};
