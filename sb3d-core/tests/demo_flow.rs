use std::path::PathBuf;
use std::time::Duration;

use nalgebra::{Point3, Vector3};
use sb3d_core::{
    start_after_load, CancellationToken, DemoConfig, Error, FrameHost, InteractionHandler, LoadError, LoadTask,
    Mesh, RenderLoop, Renderer, Result, SceneContext, Viewport,
};

/// Remembers the world-space vertices of every frame it is asked to draw
#[derive(Default)]
struct RecordingRenderer {
    frames: Vec<Vec<Point3<f32>>>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, ctx: &SceneContext) -> Result<()> {
        let positions = ctx
            .object
            .as_ref()
            .map(|object| object.world_positions())
            .unwrap_or_default();
        self.frames.push(positions);
        Ok(())
    }
}

/// Produces a fixed number of frames, optionally clicking before the first one
struct ScriptedHost {
    frames: usize,
    click: Option<(f32, f32)>,
    handler: InteractionHandler,
    click_results: Vec<bool>,
}

impl ScriptedHost {
    fn new(frames: usize, click: Option<(f32, f32)>) -> Self {
        Self {
            frames,
            click,
            handler: InteractionHandler::new(),
            click_results: Vec::new(),
        }
    }
}

impl FrameHost for ScriptedHost {
    fn next_frame(&mut self, ctx: &mut SceneContext) -> Option<Duration> {
        if self.frames == 0 {
            return None;
        }
        self.frames -= 1;

        if let Some((x, y)) = self.click.take() {
            let hit = self.handler.click(ctx, x, y).ok().flatten().is_some();
            self.click_results.push(hit);
        }
        Some(Duration::from_millis(16))
    }
}

fn write_ply(name: &str, mesh: &Mesh) -> PathBuf {
    let mut text = format!(
        "ply\nformat ascii 1.0\ncomment generated by demo_flow\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\nelement face {}\nproperty list uchar int vertex_indices\nend_header\n",
        mesh.vertex_count(),
        mesh.face_count()
    );
    for p in &mesh.positions {
        text.push_str(&format!("{} {} {}\n", p.x, p.y, p.z));
    }
    for [a, b, c] in &mesh.indices {
        text.push_str(&format!("3 {} {} {}\n", a, b, c));
    }

    let path = std::env::temp_dir().join(format!("sb3d-{}-{}.ply", name, std::process::id()));
    std::fs::write(&path, text).unwrap();
    path
}

fn offset_cube() -> Mesh {
    Mesh::cuboid(Point3::new(2.0, 0.0, 0.0), Vector3::repeat(0.5))
}

fn assert_points_close(a: &[Point3<f32>], b: &[Point3<f32>]) {
    assert_eq!(a.len(), b.len());
    for (p, q) in a.iter().zip(b) {
        assert!((p - q).norm() < 1e-5, "{:?} != {:?}", p, q);
    }
}

#[test]
fn first_frame_shows_mesh_at_original_location() {
    let mesh = offset_cube();
    let path = write_ply("first-frame", &mesh);

    let mut ctx = SceneContext::new(DemoConfig::default(), Viewport::new(800, 600));
    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(3, None);

    let frames = start_after_load(
        LoadTask::spawn(&path),
        &mut ctx,
        &mut renderer,
        &mut host,
        &CancellationToken::new(),
    )
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(frames, 3);
    assert_points_close(&renderer.frames[0], &mesh.positions);
    assert_points_close(&renderer.frames[2], &mesh.positions);

    // Geometry is re-centered, the pose carries the offset
    let object = ctx.object.as_ref().unwrap();
    let center = object.mesh.bounding_box().unwrap().center();
    assert!(center.coords.norm() < 1e-6);
    assert!((object.pose.translation - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-6);
}

#[test]
fn failed_load_renders_nothing() {
    let mut ctx = SceneContext::new(DemoConfig::default(), Viewport::new(800, 600));
    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(3, None);

    let result = start_after_load(
        LoadTask::spawn("/nonexistent/_gum.ply"),
        &mut ctx,
        &mut renderer,
        &mut host,
        &CancellationToken::new(),
    );

    assert!(matches!(result, Err(Error::Load(_))));
    assert!(renderer.frames.is_empty());
    assert_eq!(host.frames, 3);
}

#[test]
fn missing_world_is_reported_and_loop_keeps_running() {
    let mesh = offset_cube();
    let path = write_ply("no-world", &mesh);

    let mut ctx = SceneContext::without_world(DemoConfig::default(), Viewport::new(800, 600));
    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(2, None);

    let frames = start_after_load(
        LoadTask::spawn(&path),
        &mut ctx,
        &mut renderer,
        &mut host,
        &CancellationToken::new(),
    )
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(frames, 2);
    assert!(ctx.proxy.is_none());
    assert_points_close(&renderer.frames[1], &mesh.positions);
}

#[test]
fn click_on_mesh_moves_body_once_simulated() {
    let path = write_ply("click", &Mesh::cube(2.0));

    let config = DemoConfig {
        gravity: [0.0, 0.0, 0.0],
        simulate: true,
        ..DemoConfig::default()
    };
    let mut ctx = SceneContext::new(config, Viewport::new(800, 600));
    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(5, Some((430.0, 310.0)));

    start_after_load(
        LoadTask::spawn(&path),
        &mut ctx,
        &mut renderer,
        &mut host,
        &CancellationToken::new(),
    )
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(host.click_results, vec![true]);
    let impulse = host.handler.last_impulse().unwrap().impulse();
    assert!((impulse - Vector3::new(0.0, 0.0, 10.0)).norm() < 1e-3);

    // The cube drifts toward the camera after the push
    let object = ctx.object.as_ref().unwrap();
    assert!(object.pose.translation.z > 0.0);
}

#[test]
fn click_that_misses_leaves_body_at_rest() {
    let path = write_ply("miss", &Mesh::cube(2.0));

    let config = DemoConfig {
        gravity: [0.0, 0.0, 0.0],
        simulate: true,
        ..DemoConfig::default()
    };
    let mut ctx = SceneContext::new(config, Viewport::new(800, 600));
    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(3, Some((2.0, 2.0)));

    start_after_load(
        LoadTask::spawn(&path),
        &mut ctx,
        &mut renderer,
        &mut host,
        &CancellationToken::new(),
    )
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(host.click_results, vec![false]);
    let body = ctx.proxy.as_ref().unwrap().body;
    let velocity = ctx.world.as_ref().unwrap().linear_velocity(body).unwrap();
    assert!(velocity.norm() < 1e-6);
}

#[test]
fn dangling_index_in_file_fails_the_load() {
    let path = std::env::temp_dir().join(format!("sb3d-dangling-{}.ply", std::process::id()));
    std::fs::write(
        &path,
        "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 7\n",
    )
    .unwrap();

    let mut ctx = SceneContext::new(DemoConfig::default(), Viewport::new(800, 600));
    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(2, Some((400.0, 300.0)));

    let result = start_after_load(
        LoadTask::spawn(&path),
        &mut ctx,
        &mut renderer,
        &mut host,
        &CancellationToken::new(),
    );
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::Load(LoadError::Ply(_)))));
    assert!(ctx.object.is_none());
    assert!(renderer.frames.is_empty());
}

#[test]
fn invalid_mesh_leaves_loop_and_clicks_working() {
    let mut mesh = Mesh::new();
    mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
    mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
    mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
    mesh.add_face(0, 1, 7);

    let mut ctx = SceneContext::new(DemoConfig::default(), Viewport::new(800, 600));
    assert!(matches!(ctx.on_mesh_loaded(mesh), Err(Error::IndexOutOfRange { .. })));

    let mut renderer = RecordingRenderer::default();
    let mut host = ScriptedHost::new(3, Some((400.0, 300.0)));
    let frames = RenderLoop::new()
        .run(&mut ctx, &mut renderer, &mut host, &CancellationToken::new())
        .unwrap();

    assert_eq!(frames, 3);
    assert_eq!(host.click_results, vec![false]);
    assert!(renderer.frames.iter().all(|positions| positions.is_empty()));
}
