/// Soft-body proxy: a single rigid collision volume standing in for the mesh
use log::debug;
use nalgebra::{Point3, Vector3};

use crate::config::{DemoConfig, ProxyShape};
use crate::error::{Error, Result};
use crate::physics::{BodyHandle, BodyShape, PhysicsWorld};
use crate::scene::SceneObject;
use crate::transform::Transform;

/// Hull extents below this are treated as flat
const MIN_HULL_EXTENT: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftBodyProxy {
    pub body: BodyHandle,
    pub shape: ProxyShape,
    /// World-space centroid the mesh was re-centered around
    pub centroid: Point3<f32>,
}

/// Re-center `object`'s geometry on its bounding-box centroid and register a
/// proxy body for it.
///
/// The object's scale is baked into the vertices and its pose moved to the
/// world-space centroid, so every vertex keeps its world position. Nothing is
/// modified when the world is missing or the mesh lacks geometry.
pub fn build_proxy(
    object: &mut SceneObject,
    world: Option<&mut PhysicsWorld>,
    config: &DemoConfig,
) -> Result<SoftBodyProxy> {
    let world = world.ok_or(Error::MissingWorld)?;
    object.mesh.validate()?;

    let bounds = object
        .mesh
        .bounding_box()
        .ok_or(Error::MissingGeometry("position attribute"))?;
    let center = bounds.center();
    let scale = object.scale;

    let recenter = Transform::recenter_matrix(&center, scale);
    let shape = match config.proxy_shape {
        ProxyShape::Box => BodyShape::Cuboid {
            half_extents: Vector3::repeat(scale),
        },
        ProxyShape::Sphere => BodyShape::Ball { radius: scale },
        ProxyShape::ConvexHull => {
            let size = bounds.size() * scale;
            if size.iter().any(|extent| extent.abs() < MIN_HULL_EXTENT) {
                return Err(Error::DegenerateHull);
            }
            // Indexed meshes repeat corners per face; the hull only needs each once
            let mut points: Vec<Point3<f32>> = object
                .mesh
                .positions
                .iter()
                .map(|p| recenter.transform_point(p))
                .collect();
            points.sort_by_key(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]);
            points.dedup();
            BodyShape::ConvexHull { points }
        }
    };

    let centroid = object.pose.transform_point(&Point3::from(center.coords * scale));
    object.mesh.apply_matrix(&recenter);
    object.scale = 1.0;
    object.pose.translation = centroid.coords;
    debug!("re-centered mesh around {:?}", center.coords.as_slice());

    let body = world.add_body(&object.pose, &shape, config.angular_damping)?;
    Ok(SoftBodyProxy {
        body,
        shape: config.proxy_shape,
        centroid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use crate::transform::Pose;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn offset_box() -> SceneObject {
        SceneObject::new(Mesh::cuboid(Point3::new(2.0, 0.0, 0.0), Vector3::new(0.5, 1.0, 0.25)))
    }

    #[test]
    fn test_recenters_on_centroid() {
        let mut world = PhysicsWorld::default();
        let mut object = offset_box();

        let proxy = build_proxy(&mut object, Some(&mut world), &DemoConfig::default()).unwrap();

        let bounds = object.mesh.bounding_box().unwrap();
        assert_relative_eq!(bounds.center(), Point3::origin(), epsilon = 1e-6);
        assert_relative_eq!(object.pose.translation, Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(proxy.centroid, Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(
            world.pose(proxy.body).unwrap().translation,
            Vector3::new(2.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_world_positions_are_preserved() {
        let mut world = PhysicsWorld::default();
        let mut object = offset_box();
        object.scale = 1.5;
        object.pose = Pose::new(
            Vector3::new(0.0, 1.0, -1.0),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 0.9),
        );
        let before = object.world_positions();

        build_proxy(&mut object, Some(&mut world), &DemoConfig::default()).unwrap();

        assert_eq!(object.scale, 1.0);
        for (a, b) in before.iter().zip(object.world_positions()) {
            assert_relative_eq!(*a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_missing_world_leaves_mesh_untouched() {
        let mut object = offset_box();
        let original = object.mesh.clone();

        let err = build_proxy(&mut object, None, &DemoConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingWorld));
        assert_eq!(object.mesh, original);
        assert_eq!(object.pose, Pose::identity());
    }

    #[test]
    fn test_missing_index_buffer() {
        let mut world = PhysicsWorld::default();
        let mut object = offset_box();
        object.mesh.indices.clear();

        let err = build_proxy(&mut object, Some(&mut world), &DemoConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingGeometry("index buffer")));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_sphere_and_hull_shapes() {
        for shape in [ProxyShape::Sphere, ProxyShape::ConvexHull] {
            let mut world = PhysicsWorld::default();
            let mut object = offset_box();
            let config = DemoConfig {
                proxy_shape: shape,
                ..DemoConfig::default()
            };

            let proxy = build_proxy(&mut object, Some(&mut world), &config).unwrap();
            assert_eq!(proxy.shape, shape);
            assert_eq!(world.body_count(), 1);
        }
    }

    #[test]
    fn test_flat_mesh_has_no_hull() {
        let mut world = PhysicsWorld::default();
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.add_face(a, b, c);
        let mut object = SceneObject::new(mesh);
        let config = DemoConfig {
            proxy_shape: ProxyShape::ConvexHull,
            ..DemoConfig::default()
        };

        let err = build_proxy(&mut object, Some(&mut world), &config).unwrap_err();
        assert!(matches!(err, Error::DegenerateHull));
        assert_eq!(world.body_count(), 0);
    }
}
