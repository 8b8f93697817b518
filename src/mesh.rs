//! Mesh storage: a shared vertex/index buffer plus submesh ranges, owned by
//! the mesh and read-only during a draw. Supplemented from
//! `original_source/renderer/mesh.hpp`, which
//! models exactly this split between one buffer pair and several named
//! submeshes, each carrying its own material.

use crate::vertex::VertexInput;

/// A named index range into a [`Mesh`]'s shared index buffer, with its own
/// material slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submesh {
    pub name: String,
    pub index_range: std::ops::Range<usize>,
    /// Index into `Model::materials`.
    pub material: usize,
}

/// A triangle-list mesh: one vertex buffer, one index buffer (a flat run of
/// `3*T` CCW indices), and the submeshes that partition it.
pub struct Mesh {
    vertices: Vec<VertexInput>,
    indices: Vec<u32>,
    submeshes: Vec<Submesh>,
}

impl Mesh {
    pub fn new(vertices: Vec<VertexInput>, indices: Vec<u32>, submeshes: Vec<Submesh>) -> Self {
        debug_assert_eq!(indices.len() % 3, 0, "index buffer must be a triangle list");
        Self {
            vertices,
            indices,
            submeshes,
        }
    }

    /// A mesh with a single submesh spanning the whole index buffer.
    pub fn single_submesh(vertices: Vec<VertexInput>, indices: Vec<u32>, material: usize) -> Self {
        let len = indices.len();
        Self::new(
            vertices,
            indices,
            vec![Submesh {
                name: "default".into(),
                index_range: 0..len,
                material,
            }],
        )
    }

    #[inline]
    pub fn vertices(&self) -> &[VertexInput] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Look up the three vertices of face `face_index`. Returns `None` if
    /// any of the three indices is out of range for `vertices`.
    pub fn face(&self, face_index: usize) -> Option<[&VertexInput; 3]> {
        let base = face_index * 3;
        let idx = self.indices.get(base..base + 3)?;
        let v0 = self.vertices.get(idx[0] as usize)?;
        let v1 = self.vertices.get(idx[1] as usize)?;
        let v2 = self.vertices.get(idx[2] as usize)?;
        Some([v0, v1, v2])
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vek::{Vec2, Vec3};

    fn vert() -> VertexInput {
        VertexInput {
            position: Vec3::zero(),
            normal: Vec3::unit_y(),
            texcoord: Vec2::zero(),
            tangent: Vec3::unit_x(),
            bitangent: Vec3::unit_z(),
        }
    }

    #[test]
    fn face_out_of_range_index_returns_none() {
        let mesh = Mesh::single_submesh(vec![vert(), vert(), vert()], vec![0, 1, 5], 0);
        assert!(mesh.face(0).is_none());
    }

    #[test]
    fn face_in_range_returns_three_vertices() {
        let mesh = Mesh::single_submesh(vec![vert(), vert(), vert()], vec![0, 1, 2], 0);
        assert!(mesh.face(0).is_some());
        assert_eq!(mesh.face_count(), 1);
    }
}
