/// Perspective camera, screen/NDC conversion and picking rays
use nalgebra::{Matrix4, Point2, Point3, Vector3};

use crate::raycast::Ray;

/// Perspective camera for 3D rendering
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov: 75f32.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project a 3D point to 2D screen space.
    ///
    /// Returns pixel coordinates and NDC depth, or `None` when the point falls
    /// outside the view frustum.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let mvp = self.view_projection() * model_matrix;
        let ndc = mvp.transform_point(point);

        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        if ndc.x < -1.0 || ndc.x > 1.0 || ndc.y < -1.0 || ndc.y > 1.0 {
            return None;
        }

        let screen_x = (ndc.x + 1.0) * 0.5 * width as f32;
        let screen_y = (1.0 - ndc.y) * 0.5 * height as f32;

        Some((screen_x, screen_y, ndc.z))
    }

    /// Map an NDC point back into world space at the given NDC depth
    pub fn unproject(&self, ndc: &Point2<f32>, depth: f32) -> Option<Point3<f32>> {
        let inverse = self.view_projection().try_inverse()?;
        Some(inverse.transform_point(&Point3::new(ndc.x, ndc.y, depth)))
    }

    /// Ray from the camera through a point in normalized device coordinates
    pub fn ray_from_ndc(&self, ndc: &Point2<f32>) -> Option<Ray> {
        let through = self.unproject(ndc, 0.5)?;
        Ray::new(self.position, through - self.position)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Convert client-space pixel coordinates into NDC (`[-1, 1]`, y up)
pub fn screen_to_ndc(x: f32, y: f32, width: u32, height: u32) -> Point2<f32> {
    Point2::new(
        (x / width.max(1) as f32) * 2.0 - 1.0,
        -(y / height.max(1) as f32) * 2.0 + 1.0,
    )
}
