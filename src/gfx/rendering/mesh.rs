//! CPU tessellation of [`Geometry`] descriptors
//!
//! Produces interleaved [`Vertex3D`] data plus two index lists: triangles for
//! filled drawing and deduplicated edges for wireframe drawing.

use std::collections::HashSet;
use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3};

use crate::gfx::scene::Geometry;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3D {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex3D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Tessellated geometry ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3D>,
    /// Triangle list
    pub indices: Vec<u32>,
    /// Line list
    pub lines: Vec<u32>,
}

impl MeshData {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let mut mesh = MeshData::default();
        match geometry {
            Geometry::Box {
                width,
                height,
                depth,
                segments,
            } => mesh.push_box(
                Vector3::new(*width, *height, *depth),
                Vector3::new(0.0, 0.0, 0.0),
                *segments,
            ),
            Geometry::Plane {
                width,
                height,
                segments,
            } => mesh.push_grid(
                Vector3::new(-width / 2.0, -height / 2.0, 0.0),
                Vector3::new(*width, 0.0, 0.0),
                Vector3::new(0.0, *height, 0.0),
                *segments,
            ),
            Geometry::Sphere {
                radius,
                width_segments,
                height_segments,
            } => mesh.push_sphere(*radius, *width_segments, *height_segments),
            Geometry::Torus {
                radius,
                tube,
                radial_segments,
                tubular_segments,
            } => mesh.push_torus(*radius, *tube, *radial_segments, *tubular_segments),
            // Drawn as the slab the glyphs occupy, baseline at y = 0
            Geometry::Text {
                size, depth, width, ..
            } => mesh.push_box(
                Vector3::new(*width, *size, *depth),
                Vector3::new(width / 2.0, size / 2.0, depth / 2.0),
                1,
            ),
            Geometry::Buffer { positions, indices } => mesh.push_buffer(positions, indices.as_deref()),
        }
        mesh.lines = edges(&mesh.indices);
        mesh
    }

    /// Red, green and blue lines along +X, +Y and +Z
    ///
    /// Each axis is one line, so `lines[2 * axis..2 * axis + 2]` draws it alone.
    pub fn axes(size: f32) -> Self {
        let mut mesh = MeshData::default();
        for axis in [Vector3::unit_x(), Vector3::unit_y(), Vector3::unit_z()] {
            mesh.vertices.push(vertex(Vector3::new(0.0, 0.0, 0.0), axis, [0.0, 0.0]));
            mesh.vertices.push(vertex(axis * size, axis, [1.0, 0.0]));
        }
        mesh.lines = (0..6).collect();
        mesh
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// `segments` x `segments` quad grid spanning `u` and `v` from `origin`,
    /// facing `u x v`
    fn push_grid(&mut self, origin: Vector3<f32>, u: Vector3<f32>, v: Vector3<f32>, segments: u32) {
        let segments = segments.max(1);
        let normal = safe_normalize(u.cross(v), Vector3::unit_z());
        let base = self.vertices.len() as u32;
        let row = segments + 1;

        for j in 0..=segments {
            let fv = j as f32 / segments as f32;
            for i in 0..=segments {
                let fu = i as f32 / segments as f32;
                self.vertices
                    .push(vertex(origin + u * fu + v * fv, normal, [fu, 1.0 - fv]));
            }
        }
        for j in 0..segments {
            for i in 0..segments {
                let a = base + j * row + i;
                let b = a + 1;
                let c = a + row + 1;
                let d = a + row;
                self.indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }
    }

    fn push_box(&mut self, size: Vector3<f32>, center: Vector3<f32>, segments: u32) {
        let (w, h, d) = (size.x, size.y, size.z);
        let (hw, hh, hd) = (w / 2.0, h / 2.0, d / 2.0);
        let x = Vector3::new(w, 0.0, 0.0);
        let y = Vector3::new(0.0, h, 0.0);
        let z = Vector3::new(0.0, 0.0, d);

        let faces = [
            (Vector3::new(hw, -hh, hd), -z, y),
            (Vector3::new(-hw, -hh, -hd), z, y),
            (Vector3::new(-hw, hh, hd), x, -z),
            (Vector3::new(-hw, -hh, -hd), x, z),
            (Vector3::new(-hw, -hh, hd), x, y),
            (Vector3::new(hw, -hh, -hd), -x, y),
        ];
        for (origin, u, v) in faces {
            self.push_grid(center + origin, u, v, segments);
        }
    }

    fn push_sphere(&mut self, radius: f32, width_segments: u32, height_segments: u32) {
        let (w, h) = (width_segments.max(3), height_segments.max(2));
        let base = self.vertices.len() as u32;

        for iy in 0..=h {
            let fv = iy as f32 / h as f32;
            for ix in 0..=w {
                let fu = ix as f32 / w as f32;
                let normal = Vector3::new(
                    -(fu * 2.0 * PI).cos() * (fv * PI).sin(),
                    (fv * PI).cos(),
                    (fu * 2.0 * PI).sin() * (fv * PI).sin(),
                );
                self.vertices
                    .push(vertex(normal * radius, normal, [fu, 1.0 - fv]));
            }
        }

        let row = w + 1;
        for iy in 0..h {
            for ix in 0..w {
                let a = base + iy * row + ix + 1;
                let b = base + iy * row + ix;
                let c = base + (iy + 1) * row + ix;
                let d = base + (iy + 1) * row + ix + 1;
                // Pole rows collapse to fans
                if iy != 0 {
                    self.indices.extend_from_slice(&[a, b, d]);
                }
                if iy != h - 1 {
                    self.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
    }

    fn push_torus(&mut self, radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) {
        let (radial, tubular) = (radial_segments.max(2), tubular_segments.max(3));
        let base = self.vertices.len() as u32;

        for j in 0..=radial {
            let v = j as f32 / radial as f32 * 2.0 * PI;
            for i in 0..=tubular {
                let u = i as f32 / tubular as f32 * 2.0 * PI;
                let position = Vector3::new(
                    (radius + tube * v.cos()) * u.cos(),
                    (radius + tube * v.cos()) * u.sin(),
                    tube * v.sin(),
                );
                let center = Vector3::new(radius * u.cos(), radius * u.sin(), 0.0);
                let normal = safe_normalize(position - center, Vector3::unit_z());
                self.vertices.push(vertex(
                    position,
                    normal,
                    [i as f32 / tubular as f32, j as f32 / radial as f32],
                ));
            }
        }

        let row = tubular + 1;
        for j in 1..=radial {
            for i in 1..=tubular {
                let a = base + row * j + i - 1;
                let b = base + row * (j - 1) + i - 1;
                let c = base + row * (j - 1) + i;
                let d = base + row * j + i;
                self.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
    }

    /// Flat-shaded triangles; normals average the faces sharing a vertex
    fn push_buffer(&mut self, positions: &[[f32; 3]], indices: Option<&[u32]>) {
        let count = positions.len() as u32;
        let triangles: Vec<u32> = match indices {
            Some(indices) => indices
                .chunks_exact(3)
                .filter(|tri| tri.iter().all(|&i| i < count))
                .flatten()
                .copied()
                .collect(),
            None => (0..count - count % 3).collect(),
        };

        let mut normals = vec![Vector3::new(0.0f32, 0.0, 0.0); positions.len()];
        for tri in triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::from(positions[i as usize]));
            let face = (b - a).cross(c - a);
            for &i in tri {
                normals[i as usize] += face;
            }
        }

        let base = self.vertices.len() as u32;
        for (position, normal) in positions.iter().zip(normals) {
            self.vertices.push(vertex(
                Vector3::from(*position),
                safe_normalize(normal, Vector3::unit_y()),
                [0.0, 0.0],
            ));
        }
        self.indices.extend(triangles.into_iter().map(|i| base + i));
    }
}

fn vertex(position: Vector3<f32>, normal: Vector3<f32>, uv: [f32; 2]) -> Vertex3D {
    Vertex3D {
        position: position.into(),
        normal: normal.into(),
        uv,
    }
}

fn safe_normalize(v: Vector3<f32>, fallback: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > f32::EPSILON * f32::EPSILON {
        v.normalize()
    } else {
        fallback
    }
}

/// Unique undirected edges of a triangle list, as a line list
fn edges(indices: &[u32]) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for tri in indices.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            if seen.insert((a.min(b), a.max(b))) {
                lines.extend_from_slice(&[a, b]);
            }
        }
    }
    lines
}
