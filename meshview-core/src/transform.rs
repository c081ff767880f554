//! Local and world transforms for scene nodes

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// An affine transform stored as a homogeneous matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Compose translation, rotation and non-uniform scale (applied scale first)
    pub fn from_trs(
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        let matrix = Matrix4::new_translation(&translation)
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&scale);
        Self { matrix }
    }

    /// Build from column-major arrays, the layout used by glTF
    pub fn from_columns(columns: [[f32; 4]; 4]) -> Self {
        Self {
            matrix: Matrix4::from(columns),
        }
    }

    /// Translation part of the transform
    pub fn translation_part(&self) -> Vector3<f32> {
        Vector3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Replace the translation, keeping rotation and scale
    pub fn set_translation(&mut self, translation: Vector3<f32>) {
        self.matrix[(0, 3)] = translation.x;
        self.matrix[(1, 3)] = translation.y;
        self.matrix[(2, 3)] = translation.z;
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Compose this transformation with another (`self` applied last)
    pub fn compose(self, other: Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Check if this is approximately the identity transformation
    pub fn is_identity(&self, epsilon: f32) -> bool {
        (self.matrix - Matrix4::identity()).norm() < epsilon
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Matrix4<f32>> for Transform3D {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_set_translation_keeps_scale() {
        let mut t = Transform3D::from_trs(
            Vector3::new(4.0, 5.0, 6.0),
            UnitQuaternion::identity(),
            Vector3::new(2.0, 2.0, 2.0),
        );
        t.set_translation(Vector3::zeros());

        let p = t.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p, Point3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(t.translation_part(), Vector3::zeros());
    }

    #[test]
    fn test_from_columns_is_column_major() {
        let t = Transform3D::from_columns([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [3.0, -1.0, 2.0, 1.0],
        ]);
        assert_relative_eq!(t.translation_part(), Vector3::new(3.0, -1.0, 2.0));
    }

    #[test]
    fn test_compose_order() {
        let move_x = Transform3D::translation(Vector3::new(1.0, 0.0, 0.0));
        let scale = Transform3D::from_trs(
            Vector3::zeros(),
            UnitQuaternion::identity(),
            Vector3::new(3.0, 3.0, 3.0),
        );
        let p = (move_x * scale).transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 4.0);
    }
}
