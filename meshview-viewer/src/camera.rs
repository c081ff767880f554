//! Perspective camera

use meshview_core::CameraConfig;
use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// A perspective camera looking at `target`
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    /// Create a new camera
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        fov_degrees: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up: Vector3::y(),
            fov_degrees,
            aspect_ratio,
            near,
            far,
        }
    }

    /// Camera in its provisional pre-framing state
    pub fn from_config(config: &CameraConfig, aspect_ratio: f32) -> Self {
        Self::new(
            config.initial_position,
            config.initial_target,
            config.fov_degrees,
            aspect_ratio,
            config.near,
            config.far,
        )
    }

    /// Vertical field of view in radians
    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let aspect = if self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else {
            1.0
        };
        // Perspective3 panics on a zero aspect or coincident planes
        let near = self.near.max(f32::EPSILON);
        let far = if self.far > near { self.far } else { near * 2.0 };
        Perspective3::new(aspect, self.fov_radians(), near, far).into_inner()
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Unit vector from the camera towards its target, if they are apart
    pub fn forward(&self) -> Option<Vector3<f32>> {
        (self.target - self.position).try_normalize(f32::EPSILON)
    }

    /// Camera-space right and up axes expressed in world space
    pub fn screen_axes(&self) -> (Vector3<f32>, Vector3<f32>) {
        let forward = self.forward().unwrap_or_else(|| -Vector3::z());
        let right = forward
            .cross(&self.up)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::x);
        let up = right.cross(&forward);
        (right, up)
    }

    pub fn set_aspect(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_matches_config() {
        let camera = PerspectiveCamera::default();
        assert_eq!(camera.position, Point3::new(10.0, 10.0, 30.0));
        assert_eq!(camera.fov_degrees, 45.0);
        assert_eq!((camera.near, camera.far), (1.0, 20000.0));
    }

    #[test]
    fn test_target_projects_to_center() {
        let camera = PerspectiveCamera::new(
            Point3::new(0.0, 0.0, 10.0),
            Point3::origin(),
            45.0,
            1.5,
            0.1,
            100.0,
        );
        let clip = camera.view_projection() * Point3::origin().to_homogeneous();
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-6);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_screen_axes_are_orthonormal() {
        let camera = PerspectiveCamera::default();
        let (right, up) = camera.screen_axes();
        let forward = camera.forward().unwrap();
        assert_relative_eq!(right.dot(&up), 0.0, epsilon = 1e-6);
        assert_relative_eq!(right.dot(&forward), 0.0, epsilon = 1e-6);
        assert_relative_eq!(up.norm(), 1.0, epsilon = 1e-6);
        assert!(up.y > 0.0);
    }

    #[test]
    fn test_bad_aspect_does_not_poison_projection() {
        let mut camera = PerspectiveCamera::default();
        camera.set_aspect(0.0);
        assert!(camera.projection_matrix().iter().all(|v| v.is_finite()));
    }
}
