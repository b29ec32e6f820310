/// Ray casting against triangle meshes (Möller–Trumbore)
use nalgebra::{Matrix4, Point3, Vector3};

use crate::geometry::{Mesh, Triangle};

const EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Unit length
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Returns `None` for a zero-length direction
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Option<Self> {
        let direction = direction.try_normalize(EPSILON)?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Distance along the ray to a double-sided triangle, if it is hit in front of the origin
    pub fn intersect_triangle(&self, triangle: &Triangle) -> Option<f32> {
        let [v0, v1, v2] = triangle.vertices;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let p = self.direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < EPSILON {
            return None; // parallel
        }

        let inv_det = 1.0 / det;
        let s = self.origin - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = self.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(&q) * inv_det;
        (t > EPSILON).then_some(t)
    }
}

/// A ray/mesh hit in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub distance: f32,
    pub point: Point3<f32>,
    pub face_index: usize,
    /// World-space face normal, flipped to face the ray origin
    pub normal: Vector3<f32>,
}

/// Intersect `ray` with every face of `mesh` placed by `model_matrix`.
///
/// Hits are returned nearest first.
pub fn intersect_mesh(ray: &Ray, mesh: &Mesh, model_matrix: &Matrix4<f32>) -> Vec<Intersection> {
    let mut hits: Vec<Intersection> = mesh
        .triangles()
        .enumerate()
        .filter_map(|(face_index, local)| {
            let world = local.transformed(model_matrix);
            let distance = ray.intersect_triangle(&world)?;

            let mut normal = world.normal();
            if normal.dot(&ray.direction) > 0.0 {
                normal = -normal;
            }

            Some(Intersection {
                distance,
                point: ray.at(distance),
                face_index,
                normal,
            })
        })
        .collect();

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}
