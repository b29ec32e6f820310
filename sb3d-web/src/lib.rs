/// SB3D Web - WASM facade for the soft-body demo
///
/// The browser owns the drawing surface and the requestAnimationFrame loop.
/// This module keeps the scene, physics and picking on the Rust side and hands
/// JS the buffers and matrices it needs to draw.

use std::path::Path;
use std::time::Duration;

use log::{Level, LevelFilter, Log, Metadata, Record};
use nalgebra::Matrix4;
use sb3d_core::{
    parse_mesh, DemoConfig, InteractionHandler, RenderLoop, Renderer, Result, SceneContext, Viewport,
};
use wasm_bindgen::prelude::*;

/// Forwards `log` records to the browser console
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

#[wasm_bindgen(start)]
pub fn main() -> std::result::Result<(), JsValue> {
    // Better error messages in the browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    if log::set_logger(&CONSOLE_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
    Ok(())
}

/// Get crate version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Captures what JS needs to draw the current frame
#[derive(Debug, Default)]
struct FrameSnapshot {
    model: [f32; 16],
    view_projection: [f32; 16],
    visible: bool,
}

impl Renderer for FrameSnapshot {
    fn render(&mut self, ctx: &SceneContext) -> Result<()> {
        self.view_projection.copy_from_slice(ctx.camera.view_projection().as_slice());
        match &ctx.object {
            Some(object) => {
                self.model.copy_from_slice(object.model_matrix().as_slice());
                self.visible = true;
            }
            None => {
                self.model.copy_from_slice(Matrix4::<f32>::identity().as_slice());
                self.visible = false;
            }
        }
        Ok(())
    }
}

/// Scene state behind the JS facade
struct DemoState {
    ctx: SceneContext,
    interaction: InteractionHandler,
    render_loop: RenderLoop,
    snapshot: FrameSnapshot,
}

impl DemoState {
    fn new(config: DemoConfig, width: u32, height: u32) -> Self {
        Self {
            ctx: SceneContext::new(config, Viewport::new(width, height)),
            interaction: InteractionHandler::new(),
            render_loop: RenderLoop::new(),
            snapshot: FrameSnapshot::default(),
        }
    }

    fn load(&mut self, bytes: &[u8], name: Option<&str>) -> Result<()> {
        let mesh = parse_mesh(bytes, name.map(Path::new))?;
        log::info!("loaded {} vertices, {} faces", mesh.vertex_count(), mesh.face_count());
        self.ctx.on_mesh_loaded(mesh)
    }

    fn frame(&mut self, dt_ms: f64) -> Result<()> {
        let dt = Duration::from_secs_f64(dt_ms.max(0.0) / 1000.0);
        self.render_loop.tick(&mut self.ctx, &mut self.snapshot, dt)
    }

    fn positions(&self) -> Vec<f32> {
        self.ctx
            .object
            .as_ref()
            .map(|object| object.mesh.positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect())
            .unwrap_or_default()
    }

    fn indices(&self) -> Vec<u32> {
        self.ctx
            .object
            .as_ref()
            .map(|object| object.mesh.indices.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
}

fn to_js(err: sb3d_core::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct SoftBodyDemo {
    state: DemoState,
}

#[wasm_bindgen]
impl SoftBodyDemo {
    /// Create a demo for a canvas of the given size, optionally configured
    /// from a TOML string
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, config: Option<String>) -> std::result::Result<SoftBodyDemo, JsValue> {
        let config = match config {
            Some(text) => DemoConfig::from_toml_str(&text).map_err(to_js)?,
            None => DemoConfig::default(),
        };
        Ok(SoftBodyDemo {
            state: DemoState::new(config, width, height),
        })
    }

    /// Install a PLY or STL mesh fetched by JS. The file name is only used
    /// to recognise binary STL. A proxy failure is reported but the mesh stays
    /// visible.
    pub fn load(&mut self, bytes: &[u8], name: Option<String>) -> std::result::Result<(), JsValue> {
        self.state.load(bytes, name.as_deref()).map_err(to_js)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.state.ctx.set_viewport(Viewport::new(width, height));
    }

    /// Pointer click in canvas pixels. Returns whether the mesh was hit.
    pub fn click(&mut self, x: f32, y: f32) -> std::result::Result<bool, JsValue> {
        let hit = self.state.interaction.click(&mut self.state.ctx, x, y).map_err(to_js)?;
        Ok(hit.is_some())
    }

    /// Pointer drag in canvas pixels
    pub fn drag(&mut self, dx: f32, dy: f32) {
        let height = self.state.ctx.viewport.height;
        self.state.ctx.controls.rotate_by_pixels(dx, dy, height);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.state.ctx.controls.zoom(factor);
    }

    /// Advance one animation frame by `dt_ms` milliseconds
    pub fn frame(&mut self, dt_ms: f64) -> std::result::Result<(), JsValue> {
        self.state.frame(dt_ms).map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn visible(&self) -> bool {
        self.state.snapshot.visible
    }

    /// Column-major model matrix of the last frame
    pub fn model_matrix(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(&self.state.snapshot.model[..])
    }

    /// Column-major view-projection matrix of the last frame
    pub fn view_projection(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(&self.state.snapshot.view_projection[..])
    }

    /// Local-space vertex positions, xyz interleaved
    pub fn positions(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(&self.state.positions()[..])
    }

    pub fn indices(&self) -> js_sys::Uint32Array {
        js_sys::Uint32Array::from(&self.state.indices()[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA: &[u8] = b"ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 4
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
0 1 0
0 0 1
3 0 2 1
3 0 1 3
3 0 3 2
3 1 2 3
";

    #[test]
    fn test_frame_before_load_hides_object() {
        let mut state = DemoState::new(DemoConfig::default(), 800, 600);
        state.frame(16.0).unwrap();
        assert!(!state.snapshot.visible);
        assert!(state.positions().is_empty());
    }

    #[test]
    fn test_load_exposes_buffers() {
        let mut state = DemoState::new(DemoConfig::default(), 800, 600);
        state.load(TETRA, None).unwrap();
        state.frame(16.0).unwrap();

        assert!(state.snapshot.visible);
        assert_eq!(state.positions().len(), 12);
        assert_eq!(state.indices().len(), 12);
        assert!(state.ctx.proxy.is_some());
    }

    #[test]
    fn test_model_matrix_keeps_mesh_in_place() {
        let mut state = DemoState::new(DemoConfig::default(), 800, 600);
        state.load(TETRA, None).unwrap();
        state.frame(16.0).unwrap();

        // Geometry was re-centered on (0.5, 0.5, 0.5); the model matrix undoes it
        let model = Matrix4::from_column_slice(&state.snapshot.model);
        assert!((model[(0, 3)] - 0.5).abs() < 1e-5);
        assert!((model[(1, 3)] - 0.5).abs() < 1e-5);
        assert!((model[(2, 3)] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_second_load_replaces_body() {
        let mut state = DemoState::new(DemoConfig::default(), 800, 600);
        state.load(TETRA, None).unwrap();
        state.load(TETRA, None).unwrap();
        assert_eq!(state.ctx.world.as_ref().unwrap().body_count(), 1);
    }

    #[test]
    fn test_bad_bytes_are_rejected() {
        let mut state = DemoState::new(DemoConfig::default(), 800, 600);
        assert!(state.load(b"not a mesh", Some("mesh.obj")).is_err());
        assert!(state.ctx.object.is_none());
    }
}
