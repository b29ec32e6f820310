/// Scene context shared by the loader continuation, interaction handler and render loop
use log::{debug, info, warn};
use nalgebra::{Matrix4, Point3};

use crate::config::DemoConfig;
use crate::controls::OrbitControls;
use crate::error::Result;
use crate::geometry::Mesh;
use crate::physics::PhysicsWorld;
use crate::projection::Camera;
use crate::proxy::{build_proxy, SoftBodyProxy};
use crate::transform::Pose;

/// Output surface size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Width of one pixel divided by its height (about 0.5 for terminal cells)
    pub pixel_aspect: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_aspect: 1.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 * self.pixel_aspect / self.height.max(1) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    Shaded,
    Wireframe,
}

/// The displayed mesh and its world transform
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub mesh: Mesh,
    pub pose: Pose,
    pub scale: f32,
    pub style: RenderStyle,
}

impl SceneObject {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            pose: Pose::identity(),
            scale: 1.0,
            style: RenderStyle::Shaded,
        }
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.pose.to_matrix(self.scale)
    }

    /// Vertex positions after the model transform
    pub fn world_positions(&self) -> Vec<Point3<f32>> {
        let model = self.model_matrix();
        self.mesh
            .positions
            .iter()
            .map(|p| model.transform_point(p))
            .collect()
    }
}

/// Everything the demo's components read and write, passed explicitly
pub struct SceneContext {
    pub config: DemoConfig,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub viewport: Viewport,
    pub world: Option<PhysicsWorld>,
    pub object: Option<SceneObject>,
    pub proxy: Option<SoftBodyProxy>,
}

impl SceneContext {
    pub fn new(config: DemoConfig, viewport: Viewport) -> Self {
        let world = PhysicsWorld::new(config.gravity());
        let mut ctx = Self::without_world(config, viewport);
        ctx.world = Some(world);
        ctx
    }

    /// A context whose physics world has not been constructed
    pub fn without_world(config: DemoConfig, viewport: Viewport) -> Self {
        let mut camera = Camera::new(viewport.width, viewport.height);
        camera.set_aspect(viewport.aspect());
        let controls = OrbitControls::new(camera.target);

        Self {
            config,
            camera,
            controls,
            viewport,
            world: None,
            object: None,
            proxy: None,
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.camera.set_aspect(viewport.aspect());
    }

    /// Continuation of a successful load: show the mesh, then build its proxy body.
    ///
    /// A mesh with missing buffers or dangling indices is rejected and the
    /// scene left as it was. Otherwise the mesh replaces the previous one and
    /// stays in the scene even when the proxy cannot be built.
    pub fn on_mesh_loaded(&mut self, mesh: Mesh) -> Result<()> {
        mesh.validate()?;
        self.release_proxy();

        let mut object = SceneObject::new(mesh);
        object.scale = self.config.proxy_scale;
        object.style = if self.config.wireframe {
            RenderStyle::Wireframe
        } else {
            RenderStyle::Shaded
        };
        let object = self.object.insert(object);
        let proxy = build_proxy(object, self.world.as_mut(), &self.config)?;
        info!(
            "proxy {:?} built at {:?}",
            proxy.shape,
            proxy.centroid.coords.as_slice()
        );
        self.proxy = Some(proxy);
        Ok(())
    }

    /// Drop the current proxy and its body from the world
    fn release_proxy(&mut self) {
        let Some(proxy) = self.proxy.take() else {
            return;
        };
        if let Some(world) = self.world.as_mut() {
            if let Err(e) = world.remove_body(proxy.body) {
                warn!("stale proxy body: {}", e);
            }
        }
    }

    /// Copy the proxy body's simulated pose onto the displayed mesh
    pub fn sync_proxy(&mut self) -> Result<()> {
        let (Some(proxy), Some(world), Some(object)) =
            (self.proxy.as_ref(), self.world.as_ref(), self.object.as_mut())
        else {
            return Ok(());
        };

        object.pose = world.pose(proxy.body)?;
        debug!("mesh pose <- body {:?}", object.pose.translation.as_slice());
        Ok(())
    }
}
