/// Startup configuration for the demo
use std::path::Path;

use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Collision volume used as the mesh's physical stand-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProxyShape {
    /// Cube with half extents equal to the proxy scale
    #[default]
    Box,
    /// Ball with radius equal to the proxy scale
    Sphere,
    /// Convex hull of the re-centered vertices
    ConvexHull,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub gravity: [f32; 3],
    pub impulse_magnitude: f32,
    pub proxy_shape: ProxyShape,
    pub proxy_scale: f32,
    pub angular_damping: f32,
    /// Step the physics world each frame. Off by default: the mesh then stays
    /// where it was loaded until something else moves the body.
    pub simulate: bool,
    pub wireframe: bool,
    pub target_fps: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            impulse_magnitude: 10.0,
            proxy_shape: ProxyShape::Box,
            proxy_scale: 1.0,
            angular_damping: 0.1,
            simulate: false,
            wireframe: true,
            target_fps: 30,
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: DemoConfig = toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn gravity(&self) -> Vector3<f32> {
        Vector3::from(self.gravity)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(Error::Config("gravity must be finite".to_string()));
        }
        if !(self.proxy_scale.is_finite() && self.proxy_scale > 0.0) {
            return Err(Error::Config("proxy_scale must be positive".to_string()));
        }
        if !self.impulse_magnitude.is_finite() {
            return Err(Error::Config("impulse_magnitude must be finite".to_string()));
        }
        if !(self.angular_damping.is_finite() && self.angular_damping >= 0.0) {
            return Err(Error::Config("angular_damping must be non-negative".to_string()));
        }
        if self.target_fps == 0 {
            return Err(Error::Config("target_fps must be at least 1".to_string()));
        }
        Ok(())
    }
}
