//! Sutherland-Hodgman clipping against the homogeneous clip volume plus a
//! near-W guard plane.
//!
//! Grounded in `original_source/renderer/renderer.cpp`'s
//! `clipingSutherlandHodgeman` (the per-triangle driving loop over all
//! planes, with the fast-path/trivial-reject checks) and
//! `clipingSutherlandHodgemanAux` (the single-plane clip against one axis
//! and side) — kept as the same two-function split here even though the
//! bodies are rewritten from scratch against `VertexData`/`vek` rather than
//! the original's `glm` types.

use crate::interpolate::Interpolate;
use crate::vertex::VertexData;

/// Guard against division by (near) zero W when clipping against the near
/// plane.
pub const NEAR_W_EPSILON: f32 = 1e-5;

#[derive(Clone, Copy)]
enum Plane {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
    NearW,
}

const PLANES: [Plane; 7] = [
    Plane::PosX,
    Plane::NegX,
    Plane::PosY,
    Plane::NegY,
    Plane::PosZ,
    Plane::NegZ,
    Plane::NearW,
];

impl Plane {
    /// Signed "inside" distance: non-negative means the vertex is on the
    /// inside half-space of this plane.
    #[inline]
    fn distance(&self, v: &VertexData) -> f32 {
        let c = v.cpos;
        match self {
            Plane::PosX => c.w - c.x,
            Plane::NegX => c.w + c.x,
            Plane::PosY => c.w - c.y,
            Plane::NegY => c.w + c.y,
            Plane::PosZ => c.w - c.z,
            Plane::NegZ => c.w + c.z,
            Plane::NearW => c.w - NEAR_W_EPSILON,
        }
    }
}

/// Clip a triangle against all seven planes, returning an ordered polygon
/// (possibly empty, possibly the original three vertices unchanged) that a
/// caller can fan into `(v0, vi, vi+1)` triangles.
///
/// Fast path: if all three vertices are inside every plane, the triangle is
/// returned unchanged. Trivial reject: if all three vertices lie outside the
/// same plane, an empty polygon is returned.
pub fn clip_triangle(v0: VertexData, v1: VertexData, v2: VertexData) -> Vec<VertexData> {
    if PLANES.iter().all(|p| {
        p.distance(&v0) >= 0.0 && p.distance(&v1) >= 0.0 && p.distance(&v2) >= 0.0
    }) {
        return vec![v0, v1, v2];
    }

    let mut polygon = vec![v0, v1, v2];
    for plane in &PLANES {
        if polygon.is_empty() {
            break;
        }
        polygon = clip_against_plane(&polygon, plane);
    }
    polygon
}

/// Clip `polygon` against a single plane, interpolating all `VertexData`
/// attributes at each crossing.
fn clip_against_plane(polygon: &[VertexData], plane: &Plane) -> Vec<VertexData> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for i in 0..polygon.len() {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % polygon.len()];
        let d_current = plane.distance(current);
        let d_next = plane.distance(next);

        if d_current >= 0.0 {
            out.push(*current);
        }

        if (d_current >= 0.0) != (d_next >= 0.0) {
            // `t` is the parameter at which the edge crosses the plane.
            let t = d_current / (d_current - d_next);
            out.push(VertexData::lerp2(*current, *next, 1.0 - t, t));
        }
    }
    out
}

/// Fan a clipped polygon into triangles `(v0, vi, vi+1)` for `1 <= i <= k-2`.
pub fn fan_triangles(polygon: &[VertexData]) -> impl Iterator<Item = (VertexData, VertexData, VertexData)> + '_ {
    (1..polygon.len().saturating_sub(1)).map(move |i| (polygon[0], polygon[i], polygon[i + 1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vek::Vec4;

    fn vd(cpos: Vec4<f32>) -> VertexData {
        let mut v = VertexData::from_input(&crate::vertex::VertexInput {
            position: vek::Vec3::zero(),
            normal: vek::Vec3::unit_y(),
            texcoord: vek::Vec2::zero(),
            tangent: vek::Vec3::unit_x(),
            bitangent: vek::Vec3::unit_z(),
        });
        v.cpos = cpos;
        v
    }

    #[test]
    fn fully_inside_triangle_is_unchanged() {
        let a = vd(Vec4::new(-0.5, -0.5, 0.0, 1.0));
        let b = vd(Vec4::new(0.5, -0.5, 0.0, 1.0));
        let c = vd(Vec4::new(0.0, 0.5, 0.0, 1.0));
        let poly = clip_triangle(a, b, c);
        assert_eq!(poly.len(), 3);
        assert_eq!(poly[0].cpos, a.cpos);
        assert_eq!(poly[1].cpos, b.cpos);
        assert_eq!(poly[2].cpos, c.cpos);
    }

    #[test]
    fn fully_outside_single_halfspace_is_empty() {
        // All three vertices have x > w: entirely outside the +x <= +w plane.
        let a = vd(Vec4::new(3.0, 0.0, 0.0, 1.0));
        let b = vd(Vec4::new(4.0, 1.0, 0.0, 1.0));
        let c = vd(Vec4::new(5.0, -1.0, 0.0, 1.0));
        let poly = clip_triangle(a, b, c);
        assert!(poly.is_empty());
    }

    #[test]
    fn near_w_clip_produces_quad() {
        // One vertex behind the near-W guard plane.
        let a = vd(Vec4::new(0.0, 0.0, 0.0, 1.0));
        let b = vd(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let c = vd(Vec4::new(0.0, 1.0, 0.0, -1.0)); // w < epsilon
        let poly = clip_triangle(a, b, c);
        assert_eq!(poly.len(), 4, "expected a quad after clipping one vertex behind near");
        let tris: Vec<_> = fan_triangles(&poly).collect();
        assert_eq!(tris.len(), 2);
    }
}
