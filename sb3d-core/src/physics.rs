/// Physics world backed by rapier3d
///
/// Owns the global gravity vector and every rigid body. Stepping uses a fixed
/// timestep fed from an accumulator so the simulation does not depend on the
/// host's frame cadence.
use std::time::Duration;

use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use rapier3d::prelude::*;

use crate::error::{Error, Result};
use crate::transform::Pose;

pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;
/// Upper bound on catch-up steps per frame
pub const MAX_SUBSTEPS: usize = 5;

/// Opaque handle to a body registered with a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// Collision volume attached to a body
#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Cuboid { half_extents: Vector3<f32> },
    Ball { radius: f32 },
    ConvexHull { points: Vec<Point3<f32>> },
}

impl BodyShape {
    fn collider(&self) -> Result<ColliderBuilder> {
        match self {
            BodyShape::Cuboid { half_extents } => Ok(ColliderBuilder::cuboid(
                half_extents.x,
                half_extents.y,
                half_extents.z,
            )),
            BodyShape::Ball { radius } => Ok(ColliderBuilder::ball(*radius)),
            BodyShape::ConvexHull { points } => {
                ColliderBuilder::convex_hull(points).ok_or(Error::DegenerateHull)
            }
        }
    }
}

pub struct PhysicsWorld {
    gravity: Vector3<f32>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    accumulator: f32,
    steps: u64,
}

impl PhysicsWorld {
    pub fn new(gravity: Vector3<f32>) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: FIXED_TIMESTEP,
            ..IntegrationParameters::default()
        };

        Self {
            gravity,
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            accumulator: 0.0,
            steps: 0,
        }
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of fixed steps simulated so far
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Register a dynamic body with a single collider
    pub fn add_body(&mut self, pose: &Pose, shape: &BodyShape, angular_damping: f32) -> Result<BodyHandle> {
        let collider = shape.collider()?.build();
        let body = RigidBodyBuilder::dynamic()
            .position(pose.to_isometry())
            .angular_damping(angular_damping)
            .build();

        let handle = self.bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        if let Some(body) = self.bodies.get_mut(handle) {
            body.recompute_mass_properties_from_colliders(&self.colliders);
        }

        debug!("registered body {:?} at {:?}", handle, pose.translation);
        Ok(BodyHandle(handle))
    }

    /// Remove a body together with its collider
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<()> {
        self.bodies
            .remove(
                handle.0,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .ok_or_else(|| Error::UnknownBody(format!("{:?}", handle.0)))?;
        debug!("removed body {:?}", handle.0);
        Ok(())
    }

    fn body(&self, handle: BodyHandle) -> Result<&RigidBody> {
        self.bodies
            .get(handle.0)
            .ok_or_else(|| Error::UnknownBody(format!("{:?}", handle.0)))
    }

    pub fn pose(&self, handle: BodyHandle) -> Result<Pose> {
        Ok(Pose::from_isometry(self.body(handle)?.position()))
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Result<Vector3<f32>> {
        Ok(*self.body(handle)?.linvel())
    }

    pub fn angular_velocity(&self, handle: BodyHandle) -> Result<Vector3<f32>> {
        Ok(*self.body(handle)?.angvel())
    }

    /// Apply an instantaneous change in momentum at a world-space point
    pub fn apply_impulse_at_point(
        &mut self,
        handle: BodyHandle,
        impulse: Vector3<f32>,
        point: Point3<f32>,
    ) -> Result<()> {
        let body = self
            .bodies
            .get_mut(handle.0)
            .ok_or_else(|| Error::UnknownBody(format!("{:?}", handle.0)))?;
        body.apply_impulse_at_point(impulse, point, true);
        Ok(())
    }

    /// Advance the simulation by one fixed timestep
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.steps += 1;
    }

    /// Feed wall-clock time into the accumulator and run the fixed steps it covers.
    ///
    /// Returns the number of steps taken. Backlog beyond [`MAX_SUBSTEPS`] is dropped.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        self.accumulator += elapsed.as_secs_f32();

        let mut taken = 0;
        while self.accumulator >= FIXED_TIMESTEP && taken < MAX_SUBSTEPS {
            self.step();
            self.accumulator -= FIXED_TIMESTEP;
            taken += 1;
        }

        if self.accumulator >= FIXED_TIMESTEP {
            warn!(
                "physics fell behind by {:.3}s, dropping backlog",
                self.accumulator
            );
            self.accumulator = 0.0;
        }

        taken
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vector3::new(0.0, -9.82, 0.0))
    }
}
