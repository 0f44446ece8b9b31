//! Ray type and operations

use crate::core::types::Vec3;

/// Hits closer to zero than this along the ray are ignored.
const TRIANGLE_EPSILON: f32 = 1e-6;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `from` towards `to`, together with the distance between them.
    ///
    /// Returns `None` when both points coincide.
    pub fn between(from: Vec3, to: Vec3) -> Option<(Ray, f32)> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        Some((Ray::new(from, delta / length), length))
    }

    /// Ray-triangle intersection (Moller-Trumbore, double sided).
    /// Returns the ray parameter of the hit.
    pub fn intersects_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < TRIANGLE_EPSILON {
            return None; // parallel to the plane
        }
        let inv_det = 1.0 / det;

        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t > TRIANGLE_EPSILON).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between() {
        let (ray, length) = Ray::between(Vec3::ZERO, Vec3::new(0.0, 0.0, -4.0)).unwrap();
        assert_eq!(length, 4.0);
        assert_eq!(ray.direction, -Vec3::Z);
        assert!(Ray::between(Vec3::ONE, Vec3::ONE).is_none());
    }

    #[test]
    fn test_intersects_triangle_hit() {
        let ray = Ray::new(Vec3::new(0.25, 5.0, 0.25), -Vec3::Y);
        let t = ray
            .intersects_triangle(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert!((t - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_intersects_triangle_back_side() {
        // Winding does not matter
        let ray = Ray::new(Vec3::new(0.25, -5.0, 0.25), Vec3::Y);
        let hit = ray.intersects_triangle(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(hit.is_some());
    }

    #[test]
    fn test_intersects_triangle_miss() {
        let ray = Ray::new(Vec3::new(2.0, 5.0, 2.0), -Vec3::Y);
        let hit = ray.intersects_triangle(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(hit.is_none());

        // Triangle behind the origin
        let ray = Ray::new(Vec3::new(0.25, -5.0, 0.25), -Vec3::Y);
        let hit = ray.intersects_triangle(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(hit.is_none());
    }
}
