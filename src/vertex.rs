//! Vertex data types carried through the pipeline.

use vek::{Vec2, Vec3, Vec4};

use crate::interpolate::Interpolate;

/// Raw per-vertex mesh attributes, as supplied by the mesh ingest
/// collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexInput {
    pub position: Vec3<f32>,
    pub normal: Vec3<f32>,
    pub texcoord: Vec2<f32>,
    pub tangent: Vec3<f32>,
    pub bitangent: Vec3<f32>,
}

/// The shader I/O record threaded through vertex shading, clipping,
/// rasterization, and fragment shading.
///
/// `pos` holds object-space coordinates coming out of `VertexInput` and is
/// overwritten with world-space coordinates by the vertex shader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexData {
    pub pos: Vec3<f32>,
    pub nor: Vec3<f32>,
    pub tex: Vec2<f32>,
    /// Tangent, bitangent.
    pub tbn: [Vec3<f32>; 2],
    /// Clip-space position, set by the vertex shader.
    pub cpos: Vec4<f32>,
    /// Screen pixel coordinates, filled in after the viewport transform.
    pub spos: [i32; 2],
    /// Reciprocal of clip-space W, set after the perspective divide.
    pub rhw: f32,
}

impl VertexData {
    /// Build the initial per-vertex record from raw mesh attributes, before
    /// the vertex shader runs.
    pub fn from_input(v: &VertexInput) -> Self {
        Self {
            pos: v.position,
            nor: v.normal,
            tex: v.texcoord,
            tbn: [v.tangent, v.bitangent],
            cpos: Vec4::zero(),
            spos: [0, 0],
            rhw: 1.0,
        }
    }

    /// Multiply every perspective-correct varying (everything but `cpos`
    /// itself and `spos`) by `rhw`, preparing the vertex for barycentric
    /// interpolation in clip/screen space.
    pub fn premultiply_rhw(&mut self) {
        self.rhw = 1.0 / self.cpos.w;
        self.pos *= self.rhw;
        self.nor *= self.rhw;
        self.tex *= self.rhw;
        self.tbn[0] *= self.rhw;
        self.tbn[1] *= self.rhw;
    }

    /// Undo `premultiply_rhw` after barycentric interpolation, restoring
    /// perspective-correct attributes.
    pub fn perspective_correct(&self) -> Self {
        let inv_rhw = 1.0 / self.rhw;
        Self {
            pos: self.pos * inv_rhw,
            nor: self.nor * inv_rhw,
            tex: self.tex * inv_rhw,
            tbn: [self.tbn[0] * inv_rhw, self.tbn[1] * inv_rhw],
            cpos: self.cpos,
            spos: self.spos,
            rhw: self.rhw,
        }
    }
}

impl Interpolate for VertexData {
    #[inline]
    fn lerp2(a: Self, b: Self, x: f32, y: f32) -> Self {
        Self {
            pos: Vec3::lerp2(a.pos, b.pos, x, y),
            nor: Vec3::lerp2(a.nor, b.nor, x, y),
            tex: Vec2::lerp2(a.tex, b.tex, x, y),
            tbn: [
                Vec3::lerp2(a.tbn[0], b.tbn[0], x, y),
                Vec3::lerp2(a.tbn[1], b.tbn[1], x, y),
            ],
            cpos: Vec4::lerp2(a.cpos, b.cpos, x, y),
            spos: [
                (a.spos[0] as f32 * x + b.spos[0] as f32 * y) as i32,
                (a.spos[1] as f32 * x + b.spos[1] as f32 * y) as i32,
            ],
            rhw: f32::lerp2(a.rhw, b.rhw, x, y),
        }
    }

    #[inline]
    fn lerp3(a: Self, b: Self, c: Self, x: f32, y: f32, z: f32) -> Self {
        Self {
            pos: Vec3::lerp3(a.pos, b.pos, c.pos, x, y, z),
            nor: Vec3::lerp3(a.nor, b.nor, c.nor, x, y, z),
            tex: Vec2::lerp3(a.tex, b.tex, c.tex, x, y, z),
            tbn: [
                Vec3::lerp3(a.tbn[0], b.tbn[0], c.tbn[0], x, y, z),
                Vec3::lerp3(a.tbn[1], b.tbn[1], c.tbn[1], x, y, z),
            ],
            cpos: Vec4::lerp3(a.cpos, b.cpos, c.cpos, x, y, z),
            spos: [0, 0],
            rhw: f32::lerp3(a.rhw, b.rhw, c.rhw, x, y, z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_then_correct_is_identity() {
        let mut v = VertexData::from_input(&VertexInput {
            position: Vec3::new(1.0, 2.0, 3.0),
            normal: Vec3::unit_y(),
            texcoord: Vec2::new(0.5, 0.5),
            tangent: Vec3::unit_x(),
            bitangent: Vec3::unit_z(),
        });
        v.cpos = Vec4::new(0.0, 0.0, 0.0, 2.0);
        let original_pos = v.pos;
        v.premultiply_rhw();
        let restored = v.perspective_correct();
        assert!((restored.pos - original_pos).magnitude() < 1e-5);
    }
}
