/// Error types shared by the loader, physics world and scene glue
use std::path::PathBuf;

/// Failure while reading or decoding a mesh asset
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid PLY data: {0}")]
    Ply(String),

    #[error("invalid STL data: {0}")]
    Stl(String),

    #[error("load task ended without a result")]
    Interrupted,
}

/// Errors raised by the demo's scene, physics and interaction layers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("mesh is missing geometry: {0}")]
    MissingGeometry(&'static str),

    #[error("triangle {face} references vertex {index} but the mesh has {count} vertices")]
    IndexOutOfRange { face: usize, index: u32, count: usize },

    #[error("no physics world has been constructed")]
    MissingWorld,

    #[error("no proxy body has been built yet")]
    NoProxy,

    #[error("rigid body {0} is not registered with the physics world")]
    UnknownBody(String),

    #[error("cannot build a convex hull from the mesh vertices")]
    DegenerateHull,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("render failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
