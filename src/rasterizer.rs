//! Edge-function, 2x2-quad-stamp triangle rasterizer.
//!
//! Generalizes the teacher's per-pixel barycentric rasterizer
//! (`rasterizer/triangles.rs`, which walks the bounding box one pixel at a
//! time and computes a barycentric inverse-matrix once per triangle) to a
//! quad-stamp/MSAA form: instead of one sample per pixel, each of the four
//! pixels in a 2x2 stamp is tested at `N` subsample offsets, and the stamp
//! becomes one `QuadFragment` so that `dFdx`/`dFdy` are simple
//! pixel-to-pixel differences across the stamp.

use vek::Vec2;

use crate::interpolate::Interpolate;
use crate::sampler::{Offsets, PixelSampler, SubpixelOffsets};
use crate::vertex::VertexData;

/// One rasterized pixel within a [`QuadFragment`]. `spos[0] == -1` marks an
/// invalid (fully uncovered) pixel.
#[derive(Clone)]
pub struct FragmentData<const N: usize> {
    pub spos: [i32; 2],
    pub coverage: PixelSampler<bool, N>,
    pub coverage_depth: PixelSampler<f32, N>,
    /// Barycentric-interpolated varyings, still scaled by `rhw`; the
    /// consumer divides by interpolated `rhw` before shading.
    pub varyings: VertexData,
}

impl<const N: usize> FragmentData<N> {
    fn invalid() -> Self {
        Self {
            spos: [-1, -1],
            coverage: PixelSampler::fill(false),
            coverage_depth: PixelSampler::fill(0.0),
            varyings: VertexData {
                pos: vek::Vec3::zero(),
                nor: vek::Vec3::zero(),
                tex: vek::Vec2::zero(),
                tbn: [vek::Vec3::zero(), vek::Vec3::zero()],
                cpos: vek::Vec4::zero(),
                spos: [-1, -1],
                rhw: 0.0,
            },
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.spos[0] != -1
    }
}

/// A 2x2 block of fragments sharing one set of finite differences.
pub struct QuadFragment<const N: usize> {
    pub top_left: [i32; 2],
    pub pixels: [FragmentData<N>; 4],
}

#[inline]
fn edge_function(a: Vec2<f32>, b: Vec2<f32>, p: Vec2<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top-left fill rule bias, resolved here as top-left with CCW-positive
/// winding. An edge from `a` to `b` is a "top" edge if it is
/// horizontal and points in the -x direction, or a "left" edge if it points
/// in the +y (downward, screen-space) direction. Points exactly on a
/// top/left edge are included; points on any other edge are excluded.
#[inline]
fn top_left_bias(a: Vec2<f32>, b: Vec2<f32>) -> f32 {
    let is_top = a.y == b.y && b.x < a.x;
    let is_left = b.y > a.y;
    if is_top || is_left {
        0.0
    } else {
        1e-6
    }
}

/// One rasterizer-ready vertex: its screen-space XY, screen-space depth
/// (already in `[0, 1]`), and its varyings premultiplied by `rhw`.
#[derive(Clone, Copy)]
pub struct ScreenVertex {
    pub screen: Vec2<f32>,
    pub depth: f32,
    pub data: VertexData,
}

/// Rasterize one CCW-wound, already-screen-space triangle into quad
/// fragments covering the framebuffer of size `viewport`. Emits one
/// `QuadFragment` per visited 2x2 block that has at least one covered
/// sample.
pub fn rasterize_triangle<const N: usize>(
    a: ScreenVertex,
    b: ScreenVertex,
    c: ScreenVertex,
    viewport: [usize; 2],
) -> Vec<QuadFragment<N>>
where
    Offsets: SubpixelOffsets<N>,
{
    let area = edge_function(a.screen, b.screen, c.screen);
    if area == 0.0 {
        // Zero signed area; skip rather than divide by zero below.
        return Vec::new();
    }
    let inv_area = 1.0 / area;

    let min_x = a.screen.x.min(b.screen.x).min(c.screen.x).floor().max(0.0) as i32;
    let min_y = a.screen.y.min(b.screen.y).min(c.screen.y).floor().max(0.0) as i32;
    let max_x = a.screen.x.max(b.screen.x).max(c.screen.x).ceil().min(viewport[0] as f32) as i32;
    let max_y = a.screen.y.max(b.screen.y).max(c.screen.y).ceil().min(viewport[1] as f32) as i32;

    // Align the stamp grid to even pixel boundaries.
    let min_x = min_x - (min_x & 1);
    let min_y = min_y - (min_y & 1);

    let bias_ab = top_left_bias(a.screen, b.screen);
    let bias_bc = top_left_bias(b.screen, c.screen);
    let bias_ca = top_left_bias(c.screen, a.screen);

    let mut quads = Vec::new();

    let mut qy = min_y;
    while qy < max_y {
        let mut qx = min_x;
        while qx < max_x {
            let mut pixels: [FragmentData<N>; 4] = [
                FragmentData::invalid(),
                FragmentData::invalid(),
                FragmentData::invalid(),
                FragmentData::invalid(),
            ];
            let mut any_covered = false;

            for (pi, (dx, dy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
                let px = qx + dx;
                let py = qy + dy;
                if px < 0 || py < 0 || px as usize >= viewport[0] || py as usize >= viewport[1] {
                    continue;
                }

                let mut coverage = PixelSampler::<bool, N>::fill(false);
                let mut coverage_depth = PixelSampler::<f32, N>::fill(0.0);
                let mut pixel_covered = false;
                let mut rep_w0 = 0.0;
                let mut rep_w1 = 0.0;
                let mut rep_w2 = 0.0;

                for (si, (ox, oy)) in <Offsets as SubpixelOffsets<N>>::OFFSETS.into_iter().enumerate() {
                    let p = Vec2::new(px as f32 + 0.5 + ox, py as f32 + 0.5 + oy);

                    let e_ab = edge_function(a.screen, b.screen, p);
                    let e_bc = edge_function(b.screen, c.screen, p);
                    let e_ca = edge_function(c.screen, a.screen, p);

                    let inside = if area > 0.0 {
                        e_ab >= bias_ab && e_bc >= bias_bc && e_ca >= bias_ca
                    } else {
                        e_ab <= -bias_ab && e_bc <= -bias_bc && e_ca <= -bias_ca
                    };

                    if !inside {
                        continue;
                    }

                    // Barycentric weights: w0 corresponds to vertex `a`'s
                    // opposite edge (b,c), etc.
                    let w0 = e_bc * inv_area;
                    let w1 = e_ca * inv_area;
                    let w2 = e_ab * inv_area;

                    coverage.set(si, true);
                    coverage_depth.set(si, w0 * a.depth + w1 * b.depth + w2 * c.depth);
                    pixel_covered = true;
                    rep_w0 = w0;
                    rep_w1 = w1;
                    rep_w2 = w2;
                }

                if pixel_covered {
                    any_covered = true;
                    let varyings = VertexData::lerp3(a.data, b.data, c.data, rep_w0, rep_w1, rep_w2);
                    pixels[pi] = FragmentData {
                        spos: [px, py],
                        coverage,
                        coverage_depth,
                        varyings,
                    };
                }
            }

            if any_covered {
                quads.push(QuadFragment {
                    top_left: [qx, qy],
                    pixels,
                });
            }

            qx += 2;
        }
        qy += 2;
    }

    quads
}

/// Finite-difference `dFdx`/`dFdy` of a 2-component varying (e.g. texture
/// coordinates) across a quad. Invalid pixels fall back to the nearest valid
/// neighbor so mipmap selection degrades gracefully at triangle edges.
pub fn quad_derivatives<const N: usize>(quad: &QuadFragment<N>, get: impl Fn(&VertexData) -> Vec2<f32>) -> (Vec2<f32>, Vec2<f32>) {
    let sample = |i: usize| -> Option<Vec2<f32>> {
        quad.pixels[i].is_valid().then(|| get(&quad.pixels[i].varyings.perspective_correct()))
    };
    let tl = sample(0);
    let tr = sample(1);
    let bl = sample(2);
    let br = sample(3);

    let dfdx = match (tl, tr) {
        (Some(a), Some(b)) => b - a,
        _ => match (bl, br) {
            (Some(a), Some(b)) => b - a,
            _ => Vec2::zero(),
        },
    };
    let dfdy = match (tl, bl) {
        (Some(a), Some(b)) => b - a,
        _ => match (tr, br) {
            (Some(a), Some(b)) => b - a,
            _ => Vec2::zero(),
        },
    };
    (dfdx, dfdy)
}
