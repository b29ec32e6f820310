/// Pointer clicks to impulses on the proxy body
use log::{debug, info};
use nalgebra::{Point2, Point3, Vector3};

use crate::error::{Error, Result};
use crate::projection::screen_to_ndc;
use crate::raycast::intersect_mesh;
use crate::scene::SceneContext;

/// One-shot push derived from a ray hit; consumed by the physics world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseEvent {
    pub point: Point3<f32>,
    pub normal: Vector3<f32>,
    pub magnitude: f32,
}

impl ImpulseEvent {
    pub fn impulse(&self) -> Vector3<f32> {
        self.normal * self.magnitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    Idle,
    RayCastPending { ndc: Point2<f32> },
    ImpulseApplied(ImpulseEvent),
}

/// Click handler: `Idle -> RayCastPending -> ImpulseApplied -> Idle`.
///
/// A miss goes straight back to `Idle`.
#[derive(Debug)]
pub struct InteractionHandler {
    state: InteractionState,
    last_impulse: Option<ImpulseEvent>,
    clicks: u64,
}

impl InteractionHandler {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Idle,
            last_impulse: None,
            clicks: 0,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn last_impulse(&self) -> Option<ImpulseEvent> {
        self.last_impulse
    }

    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    /// Handle a click at client-space pixel coordinates.
    ///
    /// Returns the applied impulse, or `None` when the ray misses the proxy mesh.
    pub fn click(&mut self, ctx: &mut SceneContext, x: f32, y: f32) -> Result<Option<ImpulseEvent>> {
        self.clicks += 1;
        let ndc = screen_to_ndc(x, y, ctx.viewport.width, ctx.viewport.height);
        self.transition(InteractionState::RayCastPending { ndc });

        let result = self.cast(ctx, &ndc);
        if let Ok(Some(event)) = &result {
            self.last_impulse = Some(*event);
            self.transition(InteractionState::ImpulseApplied(*event));
        }
        self.transition(InteractionState::Idle);
        result
    }

    fn cast(&self, ctx: &mut SceneContext, ndc: &Point2<f32>) -> Result<Option<ImpulseEvent>> {
        let Some(object) = ctx.object.as_ref() else {
            return Ok(None);
        };
        let Some(ray) = ctx.camera.ray_from_ndc(ndc) else {
            return Ok(None);
        };

        let hits = intersect_mesh(&ray, &object.mesh, &object.model_matrix());
        let Some(hit) = hits.first() else {
            return Ok(None);
        };

        let event = ImpulseEvent {
            point: hit.point,
            normal: hit.normal,
            magnitude: ctx.config.impulse_magnitude,
        };

        let world = ctx.world.as_mut().ok_or(Error::MissingWorld)?;
        let proxy = ctx.proxy.as_ref().ok_or(Error::NoProxy)?;
        world.apply_impulse_at_point(proxy.body, event.impulse(), event.point)?;

        info!(
            "impulse {:?} at {:?} (face {})",
            event.impulse().as_slice(),
            event.point.coords.as_slice(),
            hit.face_index
        );
        Ok(Some(event))
    }

    fn transition(&mut self, next: InteractionState) {
        debug!("interaction {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

impl Default for InteractionHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoConfig;
    use crate::geometry::Mesh;
    use crate::scene::Viewport;
    use approx::assert_relative_eq;

    fn loaded_scene() -> SceneContext {
        let mut config = DemoConfig::default();
        config.gravity = [0.0, 0.0, 0.0];
        let mut ctx = SceneContext::new(config, Viewport::new(800, 600));
        ctx.on_mesh_loaded(Mesh::cube(2.0)).unwrap();
        ctx
    }

    fn body_velocity(ctx: &SceneContext) -> Vector3<f32> {
        let body = ctx.proxy.as_ref().unwrap().body;
        ctx.world.as_ref().unwrap().linear_velocity(body).unwrap()
    }

    #[test]
    fn test_miss_is_a_no_op() {
        let mut ctx = loaded_scene();
        let mut handler = InteractionHandler::new();

        let result = handler.click(&mut ctx, 5.0, 5.0).unwrap();
        assert!(result.is_none());
        assert_eq!(handler.state(), InteractionState::Idle);
        assert!(handler.last_impulse().is_none());
        assert_relative_eq!(body_velocity(&ctx), Vector3::zeros());
    }

    #[test]
    fn test_hit_applies_scaled_normal() {
        let mut ctx = loaded_scene();
        let mut handler = InteractionHandler::new();

        // Slightly off-centre to stay clear of the quad diagonal
        let event = handler.click(&mut ctx, 430.0, 310.0).unwrap().unwrap();
        assert_eq!(handler.state(), InteractionState::Idle);
        assert_eq!(handler.last_impulse(), Some(event));

        assert_relative_eq!(event.normal, Vector3::z(), epsilon = 1e-5);
        assert_relative_eq!(event.point.z, 1.0, epsilon = 1e-4);
        assert_relative_eq!(event.impulse(), Vector3::new(0.0, 0.0, 10.0), epsilon = 1e-4);

        let v = body_velocity(&ctx);
        assert!(v.z > 0.0);
        assert!(v.x.abs() < 1e-4 && v.y.abs() < 1e-4);
    }

    #[test]
    fn test_click_before_load_misses() {
        let mut ctx = SceneContext::new(DemoConfig::default(), Viewport::new(800, 600));
        let mut handler = InteractionHandler::new();
        assert!(handler.click(&mut ctx, 400.0, 300.0).unwrap().is_none());
    }

    #[test]
    fn test_hit_without_world_fails_fast() {
        let mut ctx = SceneContext::without_world(DemoConfig::default(), Viewport::new(800, 600));
        assert!(ctx.on_mesh_loaded(Mesh::cube(2.0)).is_err());

        let mut handler = InteractionHandler::new();
        let err = handler.click(&mut ctx, 430.0, 310.0).unwrap_err();
        assert!(matches!(err, Error::MissingWorld));
        assert_eq!(handler.state(), InteractionState::Idle);
    }
}
