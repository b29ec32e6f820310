/// Frame-driven render loop and the load continuation that starts it
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::error::Result;
use crate::geometry::Mesh;
use crate::loader::LoadTask;
use crate::scene::SceneContext;

/// Draws the scene through the camera
pub trait Renderer {
    fn render(&mut self, ctx: &SceneContext) -> Result<()>;
}

/// The host's display-refresh callback.
///
/// `next_frame` blocks until the next frame is due, dispatching any pending
/// input against the scene, and returns the time since the previous frame.
/// `None` means the host has gone away.
pub trait FrameHost {
    fn next_frame(&mut self, ctx: &mut SceneContext) -> Option<Duration>;
}

/// Shared flag checked once per loop iteration
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct RenderLoop {
    frames: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// One frame: controls, physics (when enabled), body -> mesh sync, render
    pub fn tick<R: Renderer + ?Sized>(
        &mut self,
        ctx: &mut SceneContext,
        renderer: &mut R,
        dt: Duration,
    ) -> Result<()> {
        ctx.controls.update(&mut ctx.camera);

        if ctx.config.simulate {
            if let Some(world) = ctx.world.as_mut() {
                world.advance(dt);
            }
        }

        if let Err(e) = ctx.sync_proxy() {
            warn!("skipping proxy sync: {}", e);
        }

        renderer.render(ctx)?;
        self.frames += 1;
        Ok(())
    }

    /// Run until cancelled or the host stops producing frames.
    ///
    /// Returns the total number of frames rendered.
    pub fn run<R, H>(
        &mut self,
        ctx: &mut SceneContext,
        renderer: &mut R,
        host: &mut H,
        token: &CancellationToken,
    ) -> Result<u64>
    where
        R: Renderer + ?Sized,
        H: FrameHost + ?Sized,
    {
        while !token.is_cancelled() {
            let Some(dt) = host.next_frame(ctx) else {
                info!("frame host closed");
                break;
            };
            self.tick(ctx, renderer, dt)?;
        }

        Ok(self.frames)
    }
}

/// Wait for a load task, logging progress. Failures are logged and returned.
pub fn await_mesh(task: LoadTask) -> Result<Mesh> {
    let path = task.path().display().to_string();
    match task.wait(|pct| info!("{:.0}% loaded", pct)) {
        Ok(mesh) => Ok(mesh),
        Err(e) => {
            error!("An error occurred while loading {}: {}", path, e);
            Err(e.into())
        }
    }
}

/// Continuation of the asynchronous load: on success install the mesh and
/// run the render loop, on failure return without rendering a frame.
///
/// A proxy that cannot be built is reported but does not stop the loop.
pub fn start_after_load<R, H>(
    task: LoadTask,
    ctx: &mut SceneContext,
    renderer: &mut R,
    host: &mut H,
    token: &CancellationToken,
) -> Result<u64>
where
    R: Renderer + ?Sized,
    H: FrameHost + ?Sized,
{
    let mesh = await_mesh(task)?;
    if let Err(e) = ctx.on_mesh_loaded(mesh) {
        error!("could not set up the loaded mesh: {}", e);
    }

    RenderLoop::new().run(ctx, renderer, host, token)
}
