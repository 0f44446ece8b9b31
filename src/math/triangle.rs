//! Triangle helpers for ground and occlusion queries

use crate::core::types::{Vec2, Vec3};

/// Project onto the horizontal plane (x, z)
pub fn to_xz(p: Vec3) -> Vec2 {
    Vec2::new(p.x, p.z)
}

/// Point-in-triangle test on the horizontal plane.
///
/// Winding-sign test: the point is inside when its side of AB differs from its
/// side of AC, and its side of BC agrees with that of AB. Works for both
/// windings.
pub fn contains_xz(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let (p, a, b, c) = (to_xz(p), to_xz(a), to_xz(b), to_xz(c));

    let ap = p - a;
    let p_ab = (b.x - a.x) * ap.y - (b.y - a.y) * ap.x > 0.0;

    if ((c.x - a.x) * ap.y - (c.y - a.y) * ap.x > 0.0) == p_ab {
        return false;
    }
    ((c.x - b.x) * (p.y - b.y) - (c.y - b.y) * (p.x - b.x) > 0.0) == p_ab
}

/// Average height of the three vertices
pub fn average_height(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (a.y + b.y + c.y) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> (Vec3, Vec3, Vec3) {
        (Vec3::ZERO, Vec3::new(10.0, 3.0, 0.0), Vec3::new(0.0, -2.0, 10.0))
    }

    #[test]
    fn test_contains_xz_inside() {
        let (a, b, c) = tri();
        assert!(contains_xz(Vec3::new(2.0, 100.0, 2.0), a, b, c));
    }

    #[test]
    fn test_contains_xz_ignores_winding() {
        let (a, b, c) = tri();
        let p = Vec3::new(2.0, 0.0, 2.0);
        assert!(contains_xz(p, a, c, b));
        assert!(contains_xz(p, b, a, c));
    }

    #[test]
    fn test_contains_xz_outside() {
        let (a, b, c) = tri();
        assert!(!contains_xz(Vec3::new(8.0, 0.0, 8.0), a, b, c));
        assert!(!contains_xz(Vec3::new(-1.0, 0.0, 2.0), a, b, c));
        assert!(!contains_xz(Vec3::new(2.0, 0.0, -1.0), a, b, c));
    }

    #[test]
    fn test_average_height() {
        let (a, b, c) = tri();
        assert!((average_height(a, b, c) - (1.0 / 3.0)).abs() < 1e-6);
    }
}
