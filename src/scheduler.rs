//! Draw-call scheduler: a two-filter parallel batch pipeline.
//!
//! Grounded in the teacher's worker-pool structure in `pipeline.rs`
//! (`render_par`/`render_inner`: an atomic work-claiming counter handed to a
//! fixed pool of scoped threads), generalized from euc's single-filter,
//! row-striped model to a two-filter, face-batched model with an explicit
//! `FragmentCache` between the filters. `crossbeam-utils` (one of the
//! teacher's `par`-feature dependencies) supplies the scoped-thread API used
//! here.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use vek::{Vec2, Vec3};

use crate::clip::{clip_triangle, fan_triangles};
use crate::error::{RenderError, RenderResult};
use crate::framebuffer::{self, FrameBuffer};
use crate::mesh::{Mesh, Submesh};
use crate::model::{AlphaBlendMode, CullMode, DepthTest, DepthWrite, RenderState};
use crate::rasterizer::{quad_derivatives, rasterize_triangle, QuadFragment, ScreenVertex};
use crate::sampler::{Offsets, SubpixelOffsets};
use crate::shader::{vertex_shader, FragmentShader, Uniforms};
use crate::vertex::VertexData;

/// Recommended batch size: large enough to amortize thread spawn/join
/// overhead, small enough that one batch's quad fragments stay cache-warm.
pub const PIPELINE_BATCH_SIZE: usize = 512;

/// An array of length `PIPELINE_BATCH_SIZE` of dynamic lists of
/// `QuadFragment`s; cache slot `i` belongs to face-in-batch index `i`.
struct FragmentCache<const N: usize> {
    slots: Vec<UnsafeCell<Vec<QuadFragment<N>>>>,
}

// SAFETY: each slot is written by exactly one worker thread, which claimed
// the corresponding face index atomically before writing, and is read only
// after Filter A finishes that batch. No two threads ever touch the same
// slot concurrently.
unsafe impl<const N: usize> Sync for FragmentCache<N> {}

impl<const N: usize> FragmentCache<N> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| UnsafeCell::new(Vec::new())).collect(),
        }
    }

    unsafe fn write(&self, slot: usize, quads: Vec<QuadFragment<N>>) {
        *self.slots[slot].get() = quads;
    }

    unsafe fn take(&self, slot: usize) -> Vec<QuadFragment<N>> {
        std::mem::take(&mut *self.slots[slot].get())
    }
}

/// An immutable bundle naming everything one call to [`Scheduler::draw`]
/// needs.
pub struct DrawCall<'a, const N: usize> {
    pub mesh: &'a Mesh,
    pub submesh: &'a Submesh,
    pub uniforms: Uniforms<'a>,
    pub shader: &'a dyn FragmentShader,
    pub state: RenderState,
    pub viewport: [usize; 2],
    /// Frustum near/far. Not consulted directly by the rasterizer (the
    /// projection matrix already bakes them into clip space); kept on the
    /// draw call for shaders/debug overlays that want to reconstruct linear
    /// depth.
    pub near: f32,
    pub far: f32,
    pub framebuffer: &'a FrameBuffer<N>,
}

/// Map a clip-space vertex (post vertex-shader) through the perspective
/// divide and viewport transform into a [`ScreenVertex`].
fn to_screen(mut v: VertexData, viewport: [usize; 2]) -> ScreenVertex {
    v.premultiply_rhw();
    let ndc = Vec3::new(v.cpos.x, v.cpos.y, v.cpos.z) * v.rhw;
    let screen = Vec2::new(
        (ndc.x * 0.5 + 0.5) * viewport[0] as f32,
        (1.0 - (ndc.y * 0.5 + 0.5)) * viewport[1] as f32,
    );
    // Depth convention: clears to 0.0, and a stored depth >= incoming
    // counts as occluded, so larger depth values must mean closer to the
    // camera, exactly inverted from the usual `ndc.z` convention.
    let depth = 1.0 - (ndc.z * 0.5 + 0.5);
    v.spos = [screen.x as i32, screen.y as i32];
    ScreenVertex { screen, depth, data: v }
}

#[inline]
fn signed_area(a: Vec2<f32>, b: Vec2<f32>, c: Vec2<f32>) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn passes_cull(area: f32, mode: CullMode) -> bool {
    match mode {
        CullMode::Disabled => area != 0.0,
        CullMode::Back => area > 0.0,
        CullMode::Front => area < 0.0,
    }
}

/// Filter A result for one face: the rasterized quads it produced, if any.
fn process_face<const N: usize>(
    mesh: &Mesh,
    face_index: usize,
    uniforms: &Uniforms<'_>,
    state: &RenderState,
    viewport: [usize; 2],
) -> Result<Vec<QuadFragment<N>>, RenderError>
where
    Offsets: SubpixelOffsets<N>,
{
    let verts = mesh.face(face_index).ok_or_else(|| {
        let base = face_index * 3;
        RenderError::OutOfRangeIndex {
            index: mesh.indices().get(base).copied().unwrap_or(u32::MAX),
            len: mesh.vertices().len(),
        }
    })?;

    let v0 = vertex_shader(uniforms, &VertexData::from_input(verts[0]));
    let v1 = vertex_shader(uniforms, &VertexData::from_input(verts[1]));
    let v2 = vertex_shader(uniforms, &VertexData::from_input(verts[2]));

    let polygon = clip_triangle(v0, v1, v2);
    if polygon.is_empty() {
        // Clipped away entirely; not an error.
        return Ok(Vec::new());
    }

    let mut quads = Vec::new();
    for (a, b, c) in fan_triangles(&polygon) {
        let sa = to_screen(a, viewport);
        let sb = to_screen(b, viewport);
        let sc = to_screen(c, viewport);

        let area = signed_area(sa.screen, sb.screen, sc.screen);
        if area == 0.0 {
            // Zero signed area; skip rather than divide by zero later.
            continue;
        }
        if !passes_cull(area, state.cull_mode) {
            continue;
        }

        quads.extend(rasterize_triangle::<N>(sa, sb, sc, viewport));
    }

    Ok(quads)
}

/// Round-half-up `N * alpha` to an integer coverage count.
fn coverage_count_for_alpha(n: usize, alpha: f32) -> usize {
    (n as f32 * alpha).round().clamp(0.0, n as f32) as usize
}

pub struct Scheduler;

impl Scheduler {
    /// Execute one draw call over its submesh's faces, in batches of
    /// [`PIPELINE_BATCH_SIZE`].
    pub fn draw<const N: usize>(draw_call: &DrawCall<N>) -> RenderResult<u64>
    where
        Offsets: SubpixelOffsets<N>,
    {
        if draw_call.framebuffer.width() != draw_call.viewport[0]
            || draw_call.framebuffer.height() != draw_call.viewport[1]
        {
            return Err(RenderError::MismatchedTargets {
                viewport: draw_call.viewport,
                framebuffer: [draw_call.framebuffer.width(), draw_call.framebuffer.height()],
            });
        }

        let start_face = draw_call.submesh.index_range.start / 3;
        let face_count = draw_call.submesh.index_range.len() / 3;
        let serial = draw_call.state.alpha_blend == AlphaBlendMode::AlphaBlend;

        let cache = FragmentCache::<N>::new(PIPELINE_BATCH_SIZE.min(face_count.max(1)));
        let mut triangles_drawn = 0u64;

        let mut offset = 0;
        while offset < face_count {
            let batch_len = PIPELINE_BATCH_SIZE.min(face_count - offset);
            let valid_slots = run_filter_a(draw_call, start_face + offset, batch_len, &cache, serial);
            triangles_drawn += run_filter_b(draw_call, &cache, &valid_slots, serial);
            offset += batch_len;
        }

        log::debug!(
            "draw call on submesh {:?}: {} faces, {} triangles reached the framebuffer",
            draw_call.submesh.name,
            face_count,
            triangles_drawn
        );

        Ok(triangles_drawn)
    }
}

/// Filter A: vertex shading, clipping, perspective divide, viewport
/// transform, cull test, and rasterization, spread over a worker pool that
/// atomically claims faces from `[start_face, start_face + batch_len)`.
fn run_filter_a<const N: usize>(
    draw_call: &DrawCall<N>,
    start_face: usize,
    batch_len: usize,
    cache: &FragmentCache<N>,
    serial: bool,
) -> Vec<usize>
where
    Offsets: SubpixelOffsets<N>,
{
    let valid = Mutex::new(Vec::with_capacity(batch_len));
    let claim = AtomicUsize::new(0);

    let worker = |_: &crossbeam_utils::thread::Scope<'_>| loop {
        let slot = claim.fetch_add(1, Ordering::Relaxed);
        if slot >= batch_len {
            break;
        }
        let face_index = start_face + slot;
        match process_face::<N>(draw_call.mesh, face_index, &draw_call.uniforms, &draw_call.state, draw_call.viewport) {
            Ok(quads) => {
                let has_fragments = !quads.is_empty();
                // SAFETY: `slot` was claimed exactly once via the atomic
                // counter above; no other worker writes this index.
                unsafe { cache.write(slot, quads) };
                if has_fragments {
                    valid.lock().unwrap().push(slot);
                }
            }
            Err(err) => {
                log::warn!("skipping face {face_index}: {err}");
                unsafe { cache.write(slot, Vec::new()) };
            }
        }
    };

    let worker_count = if serial { 1 } else { num_cpus::get().max(1) };
    crossbeam_utils::thread::scope(|s| {
        for _ in 0..worker_count {
            s.spawn(worker);
        }
    })
    .expect("rasterizer worker thread panicked");

    let mut slots = valid.into_inner().unwrap();
    if serial {
        slots.sort_unstable();
    }
    slots
}

/// Filter B: drains each valid cache slot's quad fragments, restoring
/// perspective correction, computing derivatives, running the early-Z test,
/// shading, and writing the framebuffer.
///
/// Runs fully parallel unless `serial` (alpha blend enabled), in which case
/// slots are drained strictly in submission order so that source-over
/// blending is deterministic.
fn run_filter_b<const N: usize>(draw_call: &DrawCall<N>, cache: &FragmentCache<N>, slots: &[usize], serial: bool) -> u64
where
    Offsets: SubpixelOffsets<N>,
{
    let triangles_drawn = AtomicUsize::new(0);

    let process_slot = |slot: usize| {
        // SAFETY: Filter A has fully completed for this batch, so every
        // slot it wrote is now exclusively owned by Filter B.
        let quads = unsafe { cache.take(slot) };
        if !quads.is_empty() {
            triangles_drawn.fetch_add(1, Ordering::Relaxed);
        }
        for quad in &quads {
            shade_and_write_quad(draw_call, quad);
        }
    };

    if serial {
        for &slot in slots {
            process_slot(slot);
        }
    } else {
        let claim = AtomicUsize::new(0);
        let worker = |_: &crossbeam_utils::thread::Scope<'_>| loop {
            let i = claim.fetch_add(1, Ordering::Relaxed);
            if i >= slots.len() {
                break;
            }
            process_slot(slots[i]);
        };
        let worker_count = num_cpus::get().max(1);
        crossbeam_utils::thread::scope(|s| {
            for _ in 0..worker_count {
                s.spawn(worker);
            }
        })
        .expect("shading worker thread panicked");
    }

    triangles_drawn.load(Ordering::Relaxed) as u64
}

fn shade_and_write_quad<const N: usize>(draw_call: &DrawCall<N>, quad: &QuadFragment<N>)
where
    Offsets: SubpixelOffsets<N>,
{
    let (duvdx, duvdy) = if draw_call.shader.uses_derivatives() {
        quad_derivatives(quad, |v| v.tex)
    } else {
        (Vec2::zero(), Vec2::zero())
    };

    for pixel in &quad.pixels {
        if !pixel.is_valid() {
            continue;
        }
        let [x, y] = [pixel.spos[0] as usize, pixel.spos[1] as usize];
        let guard = draw_call.framebuffer.lock(x, y);

        let mut coverage = pixel.coverage;
        if draw_call.state.depth_test == DepthTest::On {
            for s in 0..N {
                if !coverage.get(s) {
                    continue;
                }
                let stored = guard.read_depth(s);
                let incoming = pixel.coverage_depth.get(s);
                if framebuffer::occluded(stored, incoming) {
                    coverage.set(s, false);
                }
            }
            if (0..N).all(|s| !coverage.get(s)) {
                continue;
            }
        }

        let corrected = pixel.varyings.perspective_correct();
        let shaded = draw_call.shader.shade(&draw_call.uniforms, &corrected, duvdx, duvdy);
        let color = [
            (shaded.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (shaded.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (shaded.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (shaded.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ];

        if draw_call.state.alpha_blend == AlphaBlendMode::AlphaToCoverage && N >= 4 {
            let keep = coverage_count_for_alpha(N, shaded.a.clamp(0.0, 1.0));
            let zero_count = N - keep;
            let mut zeroed = 0;
            for s in 0..N {
                if zeroed >= zero_count {
                    break;
                }
                if coverage.get(s) {
                    coverage.set(s, false);
                    zeroed += 1;
                }
            }
            if (0..N).all(|s| !coverage.get(s)) {
                continue;
            }
        }

        match draw_call.state.alpha_blend {
            AlphaBlendMode::AlphaBlend => guard.write_color_masked_blend(color, &coverage),
            AlphaBlendMode::Disabled | AlphaBlendMode::AlphaToCoverage => {
                guard.write_color_masked(color, &coverage)
            }
        }

        if draw_call.state.depth_write == DepthWrite::On {
            guard.write_depth_masked(&pixel.coverage_depth, &coverage);
        }
    }
}
