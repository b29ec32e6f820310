/// Example: Load a mesh, build its proxy body and push it once, without a terminal UI
///
/// Usage: cargo run --example load_mesh -- path/to/mesh.ply

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use sb3d_core::{load_mesh, DemoConfig, InteractionHandler, Mesh, SceneContext, Viewport};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mesh = match env::args().nth(1) {
        Some(path) => match load_mesh(&path, |pct| println!("{:.0}% loaded", pct)) {
            Ok(mesh) => mesh,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            println!("No mesh provided, using default cube...");
            Mesh::cube(2.0)
        }
    };

    println!("Loaded {} vertices, {} triangles", mesh.vertex_count(), mesh.face_count());
    if let Some(bounds) = mesh.bounding_box() {
        println!("Bounds: {:?} .. {:?}", bounds.min, bounds.max);
    }

    let config = DemoConfig {
        gravity: [0.0, 0.0, 0.0],
        simulate: true,
        ..DemoConfig::default()
    };
    let mut ctx = SceneContext::new(config, Viewport::new(800, 600));
    if let Err(e) = ctx.on_mesh_loaded(mesh) {
        eprintln!("Could not build the proxy body: {}", e);
        return ExitCode::FAILURE;
    }

    // Click the middle of the viewport
    let mut handler = InteractionHandler::new();
    match handler.click(&mut ctx, 400.0, 300.0) {
        Ok(Some(event)) => println!("Impulse {:?} at {:?}", event.impulse(), event.point),
        Ok(None) => println!("The centre ray missed the mesh"),
        Err(e) => {
            eprintln!("Click failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if let Some(world) = ctx.world.as_mut() {
        for _ in 0..60 {
            world.advance(Duration::from_secs_f32(1.0 / 60.0));
        }
    }
    if let Err(e) = ctx.sync_proxy() {
        eprintln!("Sync failed: {}", e);
        return ExitCode::FAILURE;
    }
    if let Some(object) = &ctx.object {
        println!("Pose after 1s: {:?}", object.pose.translation);
    }

    ExitCode::SUCCESS
}
