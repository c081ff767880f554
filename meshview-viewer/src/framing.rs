//! Camera auto-framing
//!
//! Places the camera so a bounding box fills the view with some margin,
//! keeping the current viewing direction and only changing the distance.

use crate::camera::PerspectiveCamera;
use crate::controls::OrbitControls;
use meshview_core::BoundingBox;
use nalgebra::{Point3, Vector3};
use std::f32::consts::PI;

/// Default room left around a framed object
pub const DEFAULT_MARGIN: f32 = 1.2;

/// Extents at or below this are treated as a point
const MIN_EXTENT: f32 = 1e-6;

/// Result of framing a bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub distance: f32,
    pub target: Point3<f32>,
    pub position: Point3<f32>,
    pub near: f32,
    pub far: f32,
    /// Furthest the controls may zoom out
    pub max_distance: f32,
}

/// Compute the framing of `bounds` for a camera with vertical field of view
/// `fov_degrees` and `aspect`, looking along `from -> towards`.
///
/// Empty or zero-size boxes are framed as if their largest extent were 1, an
/// unusable aspect ratio counts as 1, and a camera sitting on its target
/// looks down -Z.
pub fn compute_framing(
    bounds: &BoundingBox,
    fov_degrees: f32,
    aspect: f32,
    from: Point3<f32>,
    towards: Point3<f32>,
    margin: f32,
) -> Framing {
    let frame = bounds.frame();
    let center = frame.center;

    let max_dim = frame.size.x.max(frame.size.y).max(frame.size.z);
    let max_dim = if max_dim.is_finite() && max_dim > MIN_EXTENT {
        max_dim
    } else {
        1.0
    };

    let half_fov_tan = (PI * fov_degrees / 360.0).tan();
    let half_fov_tan = if half_fov_tan.is_finite() && half_fov_tan > 0.0 {
        half_fov_tan
    } else {
        (PI / 8.0).tan()
    };
    let aspect = if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    };
    let margin = if margin.is_finite() && margin > 0.0 {
        margin
    } else {
        DEFAULT_MARGIN
    };

    let vertical = max_dim / (2.0 * half_fov_tan);
    let horizontal = vertical / aspect;
    let distance = margin * vertical.max(horizontal);

    let direction = (towards - from)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -Vector3::z());

    Framing {
        distance,
        target: center,
        position: center - direction * distance,
        near: distance / 100.0,
        far: distance * 100.0,
        max_distance: distance * 10.0,
    }
}

/// Frame `bounds` with `camera` and `controls`, updating both in place
pub fn frame(
    bounds: &BoundingBox,
    camera: &mut PerspectiveCamera,
    controls: &mut OrbitControls,
    margin: f32,
) -> Framing {
    let framing = compute_framing(
        bounds,
        camera.fov_degrees,
        camera.aspect_ratio,
        camera.position,
        controls.target,
        margin,
    );

    controls.max_distance = framing.max_distance;
    controls.target = framing.target;
    controls.reset_motion();

    camera.near = framing.near;
    camera.far = framing.far;
    camera.position = framing.position;
    camera.target = framing.target;

    tracing::debug!(
        "Framed object at distance {:.3} (near {:.4}, far {:.1})",
        framing.distance,
        framing.near,
        framing.far
    );
    framing
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(half: f32) -> BoundingBox {
        BoundingBox::new(Point3::new(-half, -half, -half), Point3::new(half, half, half))
    }

    #[test]
    fn test_cube_scenario() {
        let mut camera = PerspectiveCamera::default();
        camera.set_aspect(1.0);
        let mut controls = OrbitControls::default();

        let framing = frame(&cube(1.0), &mut camera, &mut controls, DEFAULT_MARGIN);

        let expected = 1.2 * (2.0 / (2.0 * (PI * 45.0 / 360.0).tan()));
        assert_relative_eq!(framing.distance, expected, epsilon = 1e-5);
        assert_relative_eq!(framing.distance, 2.897, epsilon = 1e-3);
        assert_eq!(controls.target, Point3::origin());
        assert_relative_eq!(controls.max_distance, 10.0 * framing.distance);
        assert_relative_eq!((camera.position - Point3::origin()).norm(), framing.distance, epsilon = 1e-5);
    }

    #[test]
    fn test_positive_boxes_give_valid_planes() {
        for (size, aspect) in [(0.001, 1.0), (1.0, 0.25), (50.0, 4.0), (20000.0, 1.7)] {
            let bounds = BoundingBox::new(Point3::new(3.0, -1.0, 2.0), Point3::new(3.0 + size, -1.0 + size * 0.5, 2.0 + size * 0.1));
            let framing = compute_framing(&bounds, 45.0, aspect, Point3::new(10.0, 10.0, 30.0), Point3::origin(), 1.2);
            assert!(framing.distance > 0.0);
            assert!(framing.near > 0.0);
            assert!(framing.near < framing.far);
        }
    }

    #[test]
    fn test_narrow_viewport_uses_horizontal_extent() {
        let wide = compute_framing(&cube(1.0), 45.0, 2.0, Point3::new(0.0, 0.0, 5.0), Point3::origin(), 1.2);
        let narrow = compute_framing(&cube(1.0), 45.0, 0.5, Point3::new(0.0, 0.0, 5.0), Point3::origin(), 1.2);
        assert_relative_eq!(narrow.distance, wide.distance * 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_inputs_stay_finite() {
        let point = BoundingBox::new(Point3::new(1.0, 2.0, 3.0), Point3::new(1.0, 2.0, 3.0));
        let cases = [
            compute_framing(&point, 45.0, 1.0, Point3::new(0.0, 0.0, 10.0), Point3::origin(), 1.2),
            compute_framing(&BoundingBox::empty(), 45.0, 1.0, Point3::new(0.0, 0.0, 10.0), Point3::origin(), 1.2),
            compute_framing(&point, 45.0, 0.0, Point3::origin(), Point3::origin(), 1.2),
            compute_framing(&point, 45.0, f32::NAN, Point3::new(0.0, 0.0, 10.0), Point3::origin(), 1.2),
        ];
        for framing in cases {
            assert!(framing.distance.is_finite() && framing.distance > 0.0);
            assert!(framing.position.iter().all(|v| v.is_finite()));
            assert!(framing.near > 0.0 && framing.near < framing.far);
        }

        // Zero-size box falls back to a unit extent
        assert_relative_eq!(cases[0].distance, cases[1].distance);
        assert_eq!(cases[0].target, Point3::new(1.0, 2.0, 3.0));
        // Camera on its target looks down -Z
        assert_relative_eq!(cases[2].position.z, 3.0 + cases[2].distance, epsilon = 1e-5);
    }

    #[test]
    fn test_flat_box_uses_largest_extent() {
        let flat = BoundingBox::new(Point3::new(-2.0, 0.0, -1.0), Point3::new(2.0, 0.0, 1.0));
        let framing = compute_framing(&flat, 45.0, 1.0, Point3::new(0.0, 5.0, 5.0), Point3::origin(), 1.0);
        assert_relative_eq!(framing.distance, 4.0 / (2.0 * (PI / 8.0).tan()), epsilon = 1e-5);
    }

    #[test]
    fn test_framing_is_idempotent() {
        let bounds = BoundingBox::new(Point3::new(-1.0, 0.0, -3.0), Point3::new(4.0, 2.0, 1.0));
        let mut camera = PerspectiveCamera::default();
        camera.set_aspect(1.6);
        let mut controls = OrbitControls::default();

        let first = frame(&bounds, &mut camera, &mut controls, DEFAULT_MARGIN);
        let second = frame(&bounds, &mut camera, &mut controls, DEFAULT_MARGIN);

        assert_relative_eq!(first.distance, second.distance);
        assert_relative_eq!(first.near, second.near);
        assert_relative_eq!(first.far, second.far);
        assert_relative_eq!(first.position, second.position, epsilon = 1e-4);
    }

    #[test]
    fn test_view_direction_is_preserved() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        let before = (controls.target - camera.position).normalize();

        frame(&cube(5.0), &mut camera, &mut controls, DEFAULT_MARGIN);
        let after = (controls.target - camera.position).normalize();
        assert_relative_eq!(before, after, epsilon = 1e-5);
    }
}
