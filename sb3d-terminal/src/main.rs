/// SB3D Terminal Demo - Soft-body mesh
///
/// Loads a PLY or STL mesh, wraps it in a rigid proxy body and renders it as
/// ASCII art. Clicking the mesh pushes it along the surface normal.
///
/// Usage: sb3d-terminal [mesh.ply|mesh.stl] [--config demo.toml]
///
/// Mouse:
///   - Click: push the mesh
///   - Drag: orbit the camera
///   - Wheel: zoom
/// Q/ESC quits.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::error;
use sb3d_core::{DemoConfig, LoadTask, Mesh};
use sb3d_terminal::TerminalApp;

const DEFAULT_MODEL: &str = "models/_gum.ply";

struct Args {
    mesh: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args { mesh: None, config: None };
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                return Err("usage: sb3d-terminal [mesh.ply|mesh.stl] [--config demo.toml]".to_string())
            }
            _ if args.mesh.is_none() => args.mesh = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument: {}", arg)),
        }
    }

    Ok(args)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    let config = match &args.config {
        Some(path) => match DemoConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(2);
            }
        },
        None => DemoConfig::default(),
    };

    let mut app = match TerminalApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to query the terminal: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mesh_path = args
        .mesh
        .or_else(|| Path::new(DEFAULT_MODEL).exists().then(|| PathBuf::from(DEFAULT_MODEL)));

    let result = match mesh_path {
        Some(path) => app.run(LoadTask::spawn(path)),
        None => app.run_mesh(Mesh::cube(2.0)),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
