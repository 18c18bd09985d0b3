//! Geometry descriptors
//!
//! The scene stores descriptors; the renderer tessellates them (see
//! [`MeshData`](crate::gfx::rendering::MeshData)) and caches the buffers per
//! node. Changing a mesh's descriptor forces that rebuild, so the scene counts
//! rebuilds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Box {
        width: f32,
        height: f32,
        depth: f32,
        segments: u32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Plane {
        width: f32,
        height: f32,
        segments: u32,
    },
    Torus {
        radius: f32,
        tube: f32,
        radial_segments: u32,
        tubular_segments: u32,
    },
    /// Extruded text; `outline_segments` is the total outline command count
    /// of the glyphs used, resolved from the font when the text is built.
    Text {
        text: String,
        size: f32,
        depth: f32,
        curve_segments: u32,
        outline_segments: u32,
        /// Advance width at `size`, measured from the font
        #[serde(default)]
        width: f32,
    },
    /// Caller-supplied triangles; without `indices` every three positions form one
    Buffer {
        positions: Vec<[f32; 3]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        indices: Option<Vec<u32>>,
    },
}

impl Geometry {
    /// Unit cube with `segments` subdivisions per edge
    pub fn cube(segments: u32) -> Self {
        Geometry::Box {
            width: 1.0,
            height: 1.0,
            depth: 1.0,
            segments: segments.max(1),
        }
    }

    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        Geometry::Sphere {
            radius,
            width_segments: width_segments.max(3),
            height_segments: height_segments.max(2),
        }
    }

    pub fn plane(width: f32, height: f32) -> Self {
        Geometry::Plane {
            width,
            height,
            segments: 1,
        }
    }

    pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Self {
        Geometry::Torus {
            radius,
            tube,
            radial_segments: radial_segments.max(2),
            tubular_segments: tubular_segments.max(3),
        }
    }

    /// Unindexed triangle soup, trailing positions that do not form a triangle are ignored
    pub fn buffer(positions: Vec<[f32; 3]>) -> Self {
        Geometry::Buffer {
            positions,
            indices: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Box { .. } => "box",
            Geometry::Sphere { .. } => "sphere",
            Geometry::Plane { .. } => "plane",
            Geometry::Torus { .. } => "torus",
            Geometry::Text { .. } => "text",
            Geometry::Buffer { .. } => "buffer",
        }
    }

    /// Number of triangles a tessellation of this descriptor produces
    pub fn triangle_count(&self) -> u64 {
        match self {
            Geometry::Box { segments, .. } => {
                let s = *segments as u64;
                6 * s * s * 2
            }
            Geometry::Sphere {
                width_segments,
                height_segments,
                ..
            } => {
                // Pole rows are fans, every other row is quads
                let w = *width_segments as u64;
                let h = *height_segments as u64;
                w * 2 * h.saturating_sub(1)
            }
            Geometry::Plane { segments, .. } => {
                let s = *segments as u64;
                s * s * 2
            }
            Geometry::Torus {
                radial_segments,
                tubular_segments,
                ..
            } => *radial_segments as u64 * *tubular_segments as u64 * 2,
            Geometry::Text {
                curve_segments,
                outline_segments,
                ..
            } => {
                // Front and back caps plus the extruded side walls
                let edges = *outline_segments as u64 * *curve_segments as u64;
                edges * 2 + edges * 2
            }
            Geometry::Buffer { positions, indices } => match indices {
                Some(indices) => indices.len() as u64 / 3,
                None => positions.len() as u64 / 3,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_triangles_grow_with_subdivision() {
        assert_eq!(Geometry::cube(1).triangle_count(), 12);
        assert_eq!(Geometry::cube(2).triangle_count(), 48);
    }

    #[test]
    fn torus_triangles() {
        assert_eq!(Geometry::torus(0.3, 0.2, 20, 45).triangle_count(), 1800);
    }

    #[test]
    fn constructors_enforce_minimum_segments() {
        assert_eq!(Geometry::cube(0), Geometry::cube(1));
        assert_eq!(Geometry::sphere(1.0, 0, 0), Geometry::sphere(1.0, 3, 2));
    }

    #[test]
    fn buffer_triangles_follow_indices_when_present() {
        let quad = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        assert_eq!(Geometry::buffer(quad.clone()).triangle_count(), 1);
        let indexed = Geometry::Buffer {
            positions: quad,
            indices: Some(vec![0, 1, 2, 0, 2, 3]),
        };
        assert_eq!(indexed.triangle_count(), 2);
        assert_eq!(indexed.kind(), "buffer");
    }
}
