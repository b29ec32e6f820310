/// Rigid poses and transformation matrices
use nalgebra::{Isometry3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};

/// Position and orientation of a scene node or rigid body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Pose {
    pub fn new(translation: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    pub fn from_isometry(isometry: &Isometry3<f32>) -> Self {
        Self::new(isometry.translation.vector, isometry.rotation)
    }

    /// Model matrix `T * R * S` with a uniform scale
    pub fn to_matrix(&self, scale: f32) -> Matrix4<f32> {
        self.to_isometry().to_homogeneous() * Transform::scale_matrix(scale, scale, scale)
    }

    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.to_isometry().transform_point(point)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Move `center` to the origin, then scale uniformly: `v' = scale * (v - center)`
    pub fn recenter_matrix(center: &Point3<f32>, scale: f32) -> Matrix4<f32> {
        Matrix4::new_scaling(scale) * Matrix4::new_translation(&-center.coords)
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}
