//! Axis-aligned bounding boxes

use crate::transform::Transform3D;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box; `min > max` on any axis means empty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

/// Extent and center of a bounding box, recomputed on every load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingFrame {
    pub size: Vector3<f32>,
    pub center: Point3<f32>,
}

impl BoundingBox {
    /// An empty box that absorbs the first point expanded into it
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box holding all `points`
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Self {
        let mut bounds = Self::empty();
        for point in points {
            bounds.expand(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to include `point`
    pub fn expand(&mut self, point: &Point3<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);

        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Grow the box to include another box
    pub fn union(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.expand(&other.min);
        self.expand(&other.max);
    }

    /// Box enclosing the eight transformed corners
    pub fn transformed(&self, transform: &Transform3D) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::empty();
        for &x in &[self.min.x, self.max.x] {
            for &y in &[self.min.y, self.max.y] {
                for &z in &[self.min.z, self.max.z] {
                    out.expand(&transform.transform_point(&Point3::new(x, y, z)));
                }
            }
        }
        out
    }

    /// Extent along each axis; zero for an empty box
    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        self.max - self.min
    }

    /// Center point; the origin for an empty box
    pub fn center(&self) -> Point3<f32> {
        if self.is_empty() {
            return Point3::origin();
        }
        nalgebra::center(&self.min, &self.max)
    }

    pub fn frame(&self) -> BoundingFrame {
        BoundingFrame {
            size: self.size(),
            center: self.center(),
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_empty_box_has_zero_size() {
        let bounds = BoundingBox::empty();
        assert!(bounds.is_empty());
        assert_eq!(bounds.size(), Vector3::zeros());
        assert_eq!(bounds.center(), Point3::origin());
    }

    #[test]
    fn test_single_point_is_not_empty() {
        let bounds = BoundingBox::from_points(&[Point3::new(1.0, 2.0, 3.0)]);
        assert!(!bounds.is_empty());
        assert_eq!(bounds.size(), Vector3::zeros());
        assert_eq!(bounds.center(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_union_and_frame() {
        let mut a = BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(0.0, 0.0, 0.0));
        let b = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 3.0, 1.0));
        a.union(&b);
        a.union(&BoundingBox::empty());

        let frame = a.frame();
        assert_relative_eq!(frame.size, Vector3::new(2.0, 4.0, 2.0));
        assert_relative_eq!(frame.center, Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_transformed_rotated_box() {
        let bounds = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
        let t = Transform3D::from_trs(Vector3::zeros(), rotation, Vector3::new(1.0, 1.0, 1.0));

        let rotated = bounds.transformed(&t);
        assert_relative_eq!(rotated.size(), Vector3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
    }
}
