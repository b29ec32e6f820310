/// Indexed triangle mesh and bounding volumes
use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{Error, Result};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

/// A triangle face resolved from the index buffer
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [Point3<f32>; 3],
}

impl Triangle {
    pub fn new(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Calculate the face normal from the triangle's vertices
    pub fn normal(&self) -> Vector3<f32> {
        let edge1 = self.vertices[1] - self.vertices[0];
        let edge2 = self.vertices[2] - self.vertices[0];

        edge1.cross(&edge2).normalize()
    }

    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Self {
        Self::new(
            matrix.transform_point(&self.vertices[0]),
            matrix.transform_point(&self.vertices[1]),
            matrix.transform_point(&self.vertices[2]),
        )
    }
}

/// A 3D mesh: vertex positions plus triangle index triples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Point3<f32>>,
    pub indices: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(faces),
        }
    }

    /// Push a vertex and return its index
    pub fn add_vertex(&mut self, position: Point3<f32>) -> u32 {
        self.positions.push(position);
        (self.positions.len() - 1) as u32
    }

    pub fn add_face(&mut self, a: u32, b: u32, c: u32) {
        self.indices.push([a, b, c]);
    }

    /// Append a triangle as three fresh vertices
    pub fn add_triangle(&mut self, triangle: Triangle) {
        let a = self.add_vertex(triangle.vertices[0]);
        let b = self.add_vertex(triangle.vertices[1]);
        let c = self.add_vertex(triangle.vertices[2]);
        self.add_face(a, b, c);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.indices.len()
    }

    /// Resolve face `index` into its three positions.
    ///
    /// Panics on an out-of-range face or vertex index; call [`Mesh::validate`]
    /// first on untrusted meshes.
    pub fn triangle(&self, index: usize) -> Triangle {
        let [a, b, c] = self.indices[index];
        Triangle::new(
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        )
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.indices.len()).map(move |i| self.triangle(i))
    }

    /// Check that both buffers are present and every index resolves
    pub fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(Error::MissingGeometry("position attribute"));
        }
        if self.indices.is_empty() {
            return Err(Error::MissingGeometry("index buffer"));
        }

        let count = self.positions.len();
        for (face, tri) in self.indices.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= count) {
                return Err(Error::IndexOutOfRange { face, index, count });
            }
        }

        Ok(())
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        let first = *self.positions.first()?;
        let bounds = self.positions.iter().fold(
            Aabb {
                min: first,
                max: first,
            },
            |acc, p| Aabb {
                min: acc.min.inf(p),
                max: acc.max.sup(p),
            },
        );
        Some(bounds)
    }

    /// Rewrite every vertex position in place
    pub fn apply_matrix(&mut self, matrix: &Matrix4<f32>) {
        for position in &mut self.positions {
            *position = matrix.transform_point(position);
        }
    }

    /// Create a simple cube mesh for testing
    pub fn cube(size: f32) -> Self {
        Self::cuboid(Point3::origin(), Vector3::repeat(size / 2.0))
    }

    /// Axis-aligned box with outward-facing windings
    pub fn cuboid(center: Point3<f32>, half: Vector3<f32>) -> Self {
        let (hx, hy, hz) = (half.x, half.y, half.z);
        let corner = |x: f32, y: f32, z: f32| center + Vector3::new(x * hx, y * hy, z * hz);

        // One quad per face, counter-clockwise seen from outside
        let faces = [
            // Front (+z)
            [(-1.0, -1.0, 1.0), (1.0, -1.0, 1.0), (1.0, 1.0, 1.0), (-1.0, 1.0, 1.0)],
            // Back (-z)
            [(1.0, -1.0, -1.0), (-1.0, -1.0, -1.0), (-1.0, 1.0, -1.0), (1.0, 1.0, -1.0)],
            // Top (+y)
            [(-1.0, 1.0, 1.0), (1.0, 1.0, 1.0), (1.0, 1.0, -1.0), (-1.0, 1.0, -1.0)],
            // Bottom (-y)
            [(-1.0, -1.0, -1.0), (1.0, -1.0, -1.0), (1.0, -1.0, 1.0), (-1.0, -1.0, 1.0)],
            // Right (+x)
            [(1.0, -1.0, 1.0), (1.0, -1.0, -1.0), (1.0, 1.0, -1.0), (1.0, 1.0, 1.0)],
            // Left (-x)
            [(-1.0, -1.0, -1.0), (-1.0, -1.0, 1.0), (-1.0, 1.0, 1.0), (-1.0, 1.0, -1.0)],
        ];

        let mut mesh = Self::with_capacity(24, 12);
        for quad in faces {
            let base = mesh.positions.len() as u32;
            for (x, y, z) in quad {
                mesh.add_vertex(corner(x, y, z));
            }
            mesh.add_face(base, base + 1, base + 2);
            mesh.add_face(base, base + 2, base + 3);
        }

        mesh
    }
}
