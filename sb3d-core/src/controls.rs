/// Orbit-style camera controller
use std::f32::consts::{PI, TAU};

use nalgebra::{Point3, Vector3};

use crate::projection::Camera;

const EPS: f32 = 1e-6;

/// Orbits the camera around a target on a sphere.
///
/// Input accumulates as pending deltas; [`OrbitControls::update`] applies them
/// to the camera once per frame.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    /// Fraction of the pending rotation applied per update when damping is on
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pending_azimuth: f32,
    pending_polar: f32,
    pending_scale: f32,
}

impl OrbitControls {
    pub fn new(target: Point3<f32>) -> Self {
        Self {
            target,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            pending_scale: 1.0,
        }
    }

    /// Queue a rotation in radians around the vertical axis and toward the poles
    pub fn rotate(&mut self, d_azimuth: f32, d_polar: f32) {
        self.pending_azimuth += d_azimuth;
        self.pending_polar += d_polar;
    }

    /// Queue a rotation from a pointer drag; a drag across the full viewport
    /// height turns the camera once around.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        self.rotate(
            -TAU * dx / height * self.rotate_speed,
            -TAU * dy / height * self.rotate_speed,
        );
    }

    /// Queue a zoom; factors below one move the camera closer
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.pending_scale *= factor;
        }
    }

    /// Apply pending input to the camera. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - self.target;
        let mut radius = offset.norm();

        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > EPS {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI / 2.0
        };

        if self.enable_damping {
            theta += self.pending_azimuth * self.damping_factor;
            phi += self.pending_polar * self.damping_factor;
            self.pending_azimuth *= 1.0 - self.damping_factor;
            self.pending_polar *= 1.0 - self.damping_factor;
        } else {
            theta += self.pending_azimuth;
            phi += self.pending_polar;
            self.pending_azimuth = 0.0;
            self.pending_polar = 0.0;
        }

        phi = phi.clamp(EPS, PI - EPS);
        radius = (radius * self.pending_scale).clamp(self.min_distance, self.max_distance);
        self.pending_scale = 1.0;

        let new_offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );

        let moved = (new_offset - offset).norm_squared() > EPS || camera.target != self.target;
        camera.position = self.target + new_offset;
        camera.target = self.target;
        moved
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(Point3::origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_idle_update_keeps_camera() {
        let mut camera = Camera::new(800, 600);
        let mut controls = OrbitControls::default();
        assert!(!controls.update(&mut camera));
        assert_relative_eq!(camera.position, Point3::new(0.0, 0.0, 5.0), epsilon = 1e-5);
    }

    #[test]
    fn test_quarter_turn() {
        let mut camera = Camera::new(800, 600);
        let mut controls = OrbitControls::default();
        controls.rotate(PI / 2.0, 0.0);
        assert!(controls.update(&mut camera));
        assert_relative_eq!(camera.position, Point3::new(5.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let mut camera = Camera::new(800, 600);
        let mut controls = OrbitControls::default();
        controls.rotate(0.0, -10.0);
        controls.update(&mut camera);
        assert!(camera.position.y > 4.99);
        assert!(camera.position.y <= 5.0);
    }

    #[test]
    fn test_zoom_respects_limits() {
        let mut camera = Camera::new(800, 600);
        let mut controls = OrbitControls::default();
        controls.min_distance = 2.0;
        controls.zoom(0.1);
        controls.update(&mut camera);
        assert_relative_eq!((camera.position - controls.target).norm(), 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_damping_spreads_rotation() {
        let mut camera = Camera::new(800, 600);
        let mut controls = OrbitControls::default();
        controls.enable_damping = true;
        controls.rotate(1.0, 0.0);

        controls.update(&mut camera);
        let first = camera.position.x.atan2(camera.position.z);
        assert_relative_eq!(first, 0.05, epsilon = 1e-4);

        for _ in 0..500 {
            controls.update(&mut camera);
        }
        let settled = camera.position.x.atan2(camera.position.z);
        assert_relative_eq!(settled, 1.0, epsilon = 1e-3);
    }
}
