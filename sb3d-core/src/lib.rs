/// SB3D Core Library - mesh, camera, physics and interaction logic for the
/// soft-body demo
///
/// This library holds everything that does not depend on an output surface:
/// PLY/STL loading, camera and orbit controls, ray picking, the rapier-backed
/// physics world, the proxy builder, and the frame loop driving them.

pub mod config;
pub mod controls;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod loader;
pub mod physics;
pub mod ply;
pub mod projection;
pub mod proxy;
pub mod raycast;
pub mod render_loop;
pub mod scene;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use config::{DemoConfig, ProxyShape};
pub use controls::OrbitControls;
pub use error::{Error, LoadError, Result};
pub use geometry::{Aabb, Mesh, Triangle};
pub use interaction::{ImpulseEvent, InteractionHandler, InteractionState};
pub use loader::{load_mesh, parse_mesh, LoadEvent, LoadTask};
pub use physics::{BodyHandle, PhysicsWorld};
pub use projection::{screen_to_ndc, Camera};
pub use proxy::{build_proxy, SoftBodyProxy};
pub use raycast::{Intersection, Ray};
pub use render_loop::{start_after_load, CancellationToken, FrameHost, RenderLoop, Renderer};
pub use scene::{RenderStyle, SceneContext, SceneObject, Viewport};
pub use transform::{Pose, Transform};
