//! Camera used to evaluate grid visibility

use crate::core::types::{Vec3, Mat4, Quat};
use crate::math::Frustum;

/// Camera with position, rotation, and projection parameters
#[derive(Clone, Debug)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Rotation as quaternion
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 1.0,
            far: 100_000.0,
        }
    }

    /// Create camera looking at a target
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        let rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));

        Self {
            rotation,
            ..Self::new(position, 60.0, 16.0 / 9.0)
        }
    }

    /// Get view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-self.position);
        rotation_matrix * translation_matrix
    }

    /// Get projection matrix (camera to clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Full view frustum
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }

    /// View frustum with the far plane pulled in to `radius`.
    ///
    /// Never reaches further than the regular far plane.
    pub fn close_frustum(&self, radius: f32) -> Frustum {
        let far = radius.clamp(self.near * 2.0, self.far);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, far);
        Frustum::from_view_projection(&(proj * self.view_matrix()))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5.0), 60.0, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;

    #[test]
    fn test_forward_default() {
        let camera = Camera::default();
        let forward = camera.forward();
        assert!((forward.z - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn test_look_at_forward() {
        let camera = Camera::look_at(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::Y);
        let forward = camera.forward();
        assert!((forward.x - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_view_matrix_translation() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(10.0, 0.0, 0.0);

        let origin_in_camera = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin_in_camera.x - (-10.0)).abs() < 0.001);
    }

    #[test]
    fn test_close_frustum_cuts_far_points() {
        let camera = Camera::look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let full = camera.frustum();
        let close = camera.close_frustum(100.0);

        let near_box = Aabb::new(Vec3::new(-1.0, -1.0, -51.0), Vec3::new(1.0, 1.0, -49.0));
        let far_box = Aabb::new(Vec3::new(-1.0, -1.0, -501.0), Vec3::new(1.0, 1.0, -499.0));
        assert!(full.intersects_aabb(&near_box));
        assert!(full.intersects_aabb(&far_box));
        assert!(close.intersects_aabb(&near_box));
        assert!(!close.intersects_aabb(&far_box));
    }
}
