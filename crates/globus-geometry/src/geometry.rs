//! The generated mesh entity: vertex, normal, and element buffers plus the
//! reference center the vertices are relative to.

use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use static_assertions::const_assert_eq;

/// Primitive assembly mode of an element buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
}

/// A single f32 vertex position, relative to its geometry's reference center.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

const_assert_eq!(std::mem::size_of::<Vertex>(), 12);

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
        }
    }

    /// Offset of `point` from `reference_center`, narrowed to f32.
    pub fn relative_to(point: DVec3, reference_center: DVec3) -> Self {
        let d = point - reference_center;
        Self::new(d.x as f32, d.y as f32, d.z as f32)
    }

    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(
            f64::from(self.position[0]),
            f64::from(self.position[1]),
            f64::from(self.position[2]),
        )
    }
}

/// A generated mesh. Vertex-only and element-only geometries are both valid:
/// airspaces cache element buffers separately from the terrain-dependent
/// vertex buffers they index.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    mode: DrawMode,
    vertices: Vec<Vertex>,
    normals: Vec<Vertex>,
    indices: Vec<u32>,
    reference_center: DVec3,
}

impl Geometry {
    /// Vertex geometry from model-space points, stored relative to `reference_center`.
    pub fn from_points(points: &[DVec3], reference_center: DVec3) -> Self {
        Self {
            mode: DrawMode::Points,
            vertices: points
                .iter()
                .map(|p| Vertex::relative_to(*p, reference_center))
                .collect(),
            normals: Vec::new(),
            indices: Vec::new(),
            reference_center,
        }
    }

    /// Element-only geometry.
    pub fn from_indices(mode: DrawMode, indices: Vec<u32>) -> Self {
        Self {
            mode,
            vertices: Vec::new(),
            normals: Vec::new(),
            indices,
            reference_center: DVec3::ZERO,
        }
    }

    /// Attach per-vertex normals (unit vectors, not offset by the reference center).
    pub fn with_normals(mut self, normals: &[DVec3]) -> Self {
        self.normals = normals
            .iter()
            .map(|n| Vertex::new(n.x as f32, n.y as f32, n.z as f32))
            .collect();
        self
    }

    pub fn with_mode(mut self, mode: DrawMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn normals(&self) -> Option<&[Vertex]> {
        (!self.normals.is_empty()).then_some(self.normals.as_slice())
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn reference_center(&self) -> DVec3 {
        self.reference_center
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn element_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    /// Bytes occupied by all buffers, used for cache accounting.
    pub fn size_in_bytes(&self) -> usize {
        bytemuck::cast_slice::<Vertex, u8>(&self.vertices).len()
            + bytemuck::cast_slice::<Vertex, u8>(&self.normals).len()
            + bytemuck::cast_slice::<u32, u8>(&self.indices).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Vertices are stored as offsets from the reference center.
    #[test]
    fn test_vertices_relative_to_reference_center() {
        let rc = DVec3::new(6_378_137.0, 0.0, 0.0);
        let g = Geometry::from_points(&[rc + DVec3::new(1.5, -2.0, 3.0)], rc);
        assert_eq!(g.vertices()[0].position, [1.5, -2.0, 3.0]);
        assert_eq!(g.reference_center(), rc);
    }

    #[test]
    fn test_size_in_bytes_counts_all_buffers() {
        let g = Geometry::from_points(&[DVec3::ZERO, DVec3::X], DVec3::ZERO)
            .with_normals(&[DVec3::Y, DVec3::Y]);
        assert_eq!(g.size_in_bytes(), 2 * 12 + 2 * 12);
        let e = Geometry::from_indices(DrawMode::Triangles, vec![0, 1, 2]);
        assert_eq!(e.size_in_bytes(), 12);
        assert!(e.normals().is_none());
    }
}
