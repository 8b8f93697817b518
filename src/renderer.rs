//! Renderer facade: owns the model list, camera matrices, lights, textures,
//! and the double-buffered framebuffer, and drives [`Scheduler`] over each
//! model's submeshes.
//!
//! Grounded in `original_source/renderer/renderer.hpp`/`.cpp`'s `Renderer`
//! class (model list + camera + light registry + texture store owned by one
//! object, `renderAllModels`/`commitRenderedColorBuffer` as the two
//! public entry points), restructured around this crate's `DrawCall`/
//! `Scheduler` split instead of the original's single monolithic draw loop.

use std::sync::Arc;

use vek::{Mat4, Vec3};

use crate::error::RenderResult;
use crate::framebuffer::{FrameBuffer, Rgba8};
use crate::light::{Light, LightRegistry};
use crate::mesh::Mesh;
use crate::model::Model;
use crate::sampler::{Offsets, SubpixelOffsets};
use crate::scheduler::{DrawCall, Scheduler};
use crate::shader::Uniforms;
use crate::texture::{FilterMode, Layout, TextureId, TextureStore, WrapMode};

/// The camera/projection state shared by every draw call in a frame: a
/// single view-projection matrix and viewer position.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub view: Mat4<f32>,
    pub projection: Mat4<f32>,
    pub position: Vec3<f32>,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view_proj(&self) -> Mat4<f32> {
        self.projection * self.view
    }
}

/// Global, per-frame shading knobs that apply to every model unless a
/// model's own render state says otherwise.
#[derive(Clone, Copy, Debug)]
pub struct FrameSettings {
    pub exposure: f32,
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            wrap: WrapMode::Repeat,
            filter: FilterMode::Linear,
        }
    }
}

/// Owns every model, the camera, the light/texture registries, and a
/// front/back framebuffer pair. Double buffering is the renderer's
/// responsibility, not the framebuffer's.
pub struct Renderer<const N: usize> {
    width: usize,
    height: usize,
    models: Vec<Model>,
    camera: Camera,
    settings: FrameSettings,
    lights: LightRegistry,
    textures: TextureStore,
    front: FrameBuffer<N>,
    back: FrameBuffer<N>,
    clear_color: Rgba8,
}

impl<const N: usize> Renderer<N>
where
    Offsets: SubpixelOffsets<N>,
{
    pub fn new(width: usize, height: usize, camera: Camera) -> Self {
        log::info!("creating renderer: {width}x{height}, {N}x MSAA");
        Self {
            width,
            height,
            models: Vec::new(),
            camera,
            settings: FrameSettings::default(),
            lights: LightRegistry::new(),
            textures: TextureStore::new(),
            front: FrameBuffer::new(width, height),
            back: FrameBuffer::new(width, height),
            clear_color: [0, 0, 0, 255],
        }
    }

    pub fn add_model(&mut self, mesh: Arc<Mesh>, shader: Arc<dyn crate::shader::FragmentShader>, materials: Vec<crate::model::MaterialSlot>) -> usize {
        self.models.push(Model::new(mesh, shader, materials));
        self.models.len() - 1
    }

    pub fn model_mut(&mut self, index: usize) -> Option<&mut Model> {
        self.models.get_mut(index)
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn settings_mut(&mut self) -> &mut FrameSettings {
        &mut self.settings
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.add(light)
    }

    pub fn light_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn upload_texture(&mut self, width: usize, height: usize, channels: usize, data: &[u8], layout: Layout) -> TextureId {
        self.textures.upload(width, height, channels, data, layout)
    }

    /// Clear the back buffer, ready for a new frame. Depth clears to `0.0`,
    /// per the framebuffer's occlusion convention.
    pub fn begin_frame(&mut self) {
        self.back.clear_color_and_depth(self.clear_color, 0.0);
    }

    /// Render every model into the back buffer, each submesh/material
    /// combination becoming one [`DrawCall`], then resolve the back
    /// buffer's MSAA samples and swap it into the front buffer. Returns the
    /// number of triangles that reached the framebuffer this frame.
    pub fn render_all_models(&mut self) -> RenderResult<u64> {
        let mut triangles = 0u64;
        for model in &self.models {
            triangles += self.render_model(model)?;
        }
        self.back.resolve_in_place();
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(triangles)
    }

    fn render_model(&self, model: &Model) -> RenderResult<u64> {
        let view_proj = self.camera.view_proj();
        let mut triangles = 0u64;
        for submesh in model.mesh().submeshes() {
            let slot = model.materials.get(submesh.material).cloned().unwrap_or_default();
            let uniforms = Uniforms {
                model: model.model_matrix(),
                view_proj,
                viewer_pos: self.camera.position,
                textures: slot.textures,
                material: slot.material,
                exposure: self.settings.exposure,
                lighting_enabled: model.state.lighting == crate::model::Lighting::On,
                wrap: self.settings.wrap,
                filter: self.settings.filter,
                lights: &self.lights,
                texture_store: &self.textures,
            };
            let draw_call = DrawCall {
                mesh: model.mesh(),
                submesh,
                uniforms,
                shader: model.shader.as_ref(),
                state: model.state,
                viewport: [self.width, self.height],
                near: self.camera.near,
                far: self.camera.far,
                framebuffer: &self.back,
            };
            triangles += Scheduler::draw(&draw_call)?;
        }
        Ok(triangles)
    }

    /// Read the front buffer's already-resolved subsample 0 and pack it into
    /// a tightly-packed RGB byte buffer of length `width * height * 3`,
    /// top-left pixel first, row-major, alpha dropped. Does no resolve work
    /// of its own — that already happened in [`Self::render_all_models`].
    pub fn commit_rendered_color_buffer(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width * self.height * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let rgba = self.front.read_color(x, y, 0);
                out.extend_from_slice(&rgba[..3]);
            }
        }
        out
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::model::{AlphaBlendMode, CullMode, DepthTest, DepthWrite, MaterialSlot};
    use crate::shader::{FragmentShader, Passthrough};
    use crate::vertex::{VertexData, VertexInput};
    use vek::{Rgba, Vec2};

    fn camera() -> Camera {
        Camera {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            position: Vec3::new(0.0, 0.0, 5.0),
            near: 0.1,
            far: 100.0,
        }
    }

    fn triangle_mesh() -> Arc<Mesh> {
        let verts = vec![
            VertexInput {
                position: Vec3::new(-0.5, -0.5, 0.0),
                normal: Vec3::unit_z(),
                texcoord: Vec2::zero(),
                tangent: Vec3::unit_x(),
                bitangent: Vec3::unit_y(),
            },
            VertexInput {
                position: Vec3::new(0.5, -0.5, 0.0),
                normal: Vec3::unit_z(),
                texcoord: Vec2::zero(),
                tangent: Vec3::unit_x(),
                bitangent: Vec3::unit_y(),
            },
            VertexInput {
                position: Vec3::new(0.0, 0.5, 0.0),
                normal: Vec3::unit_z(),
                texcoord: Vec2::zero(),
                tangent: Vec3::unit_x(),
                bitangent: Vec3::unit_y(),
            },
        ];
        Arc::new(Mesh::single_submesh(verts, vec![0, 1, 2], 0))
    }

    #[test]
    fn render_all_models_is_deterministic() {
        let mut renderer = Renderer::<1>::new(8, 8, camera());
        renderer.add_model(triangle_mesh(), Arc::new(Passthrough), vec![MaterialSlot::default()]);

        renderer.begin_frame();
        renderer.render_all_models().unwrap();
        let first = renderer.commit_rendered_color_buffer();

        renderer.begin_frame();
        renderer.render_all_models().unwrap();
        let second = renderer.commit_rendered_color_buffer();

        assert_eq!(first, second);
    }

    #[test]
    fn empty_frame_is_clear_color() {
        let renderer = Renderer::<1>::new(4, 4, camera());
        let mut r2 = renderer;
        r2.begin_frame();
        r2.render_all_models().unwrap();
        let resolved = r2.commit_rendered_color_buffer();
        assert_eq!(resolved.len(), 4 * 4 * 3);
        assert!(resolved.chunks(3).all(|p| p == [0, 0, 0]));
    }

    /// A constant-RGBA fragment shader, for scenarios that only care about
    /// coverage, not shading, so the geometry/clip/cull pipeline is what's
    /// under test.
    struct Constant(Rgba<f32>);

    impl FragmentShader for Constant {
        fn shade(&self, _u: &Uniforms, _frag: &VertexData, _dx: Vec2<f32>, _dy: Vec2<f32>) -> Rgba<f32> {
            self.0
        }

        fn uses_derivatives(&self) -> bool {
            false
        }
    }

    fn clip_space_mesh(verts: [(f32, f32, f32); 3]) -> Arc<Mesh> {
        let input: Vec<VertexInput> = verts
            .into_iter()
            .map(|(x, y, z)| VertexInput {
                position: Vec3::new(x, y, z),
                normal: Vec3::unit_z(),
                texcoord: Vec2::zero(),
                tangent: Vec3::unit_x(),
                bitangent: Vec3::unit_y(),
            })
            .collect();
        Arc::new(Mesh::single_submesh(input, vec![0, 1, 2], 0))
    }

    fn identity_camera() -> Camera {
        Camera {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            position: Vec3::zero(),
            near: 0.1,
            far: 100.0,
        }
    }

    #[test]
    fn scenario_a_diagonal_triangle_staircase() {
        // A screen-aligned triangle covering roughly half the 4x4 buffer,
        // with the exact boundary pixels pinned by the top-left fill rule.
        // The triangle here is the full NDC square cut along its diagonal
        // ((-1,-1), (1,-1), (-1,1)) rather than an overhanging triangle that
        // (worked out by hand against `to_screen`'s mapping) would be
        // tangent to the viewport's far corner and so cover the *entire*
        // buffer, not a partial staircase. This triangle exercises the same
        // fill-rule edge case without that mismatch: its hypotenuse passes
        // exactly through every diagonal pixel center, so whether
        // `col == row` pixels are covered is entirely down to the fill
        // rule, not to triangle placement.
        let mut renderer = Renderer::<1>::new(4, 4, identity_camera());
        renderer.add_model(
            clip_space_mesh([(-1.0, -1.0, 0.0), (1.0, -1.0, 0.0), (-1.0, 1.0, 0.0)]),
            Arc::new(Constant(Rgba::new(1.0, 0.0, 0.0, 1.0))),
            vec![MaterialSlot::default()],
        );
        renderer.model_mut(0).unwrap().state.cull_mode = CullMode::Disabled;

        renderer.begin_frame();
        renderer.render_all_models().unwrap();
        let pixels = renderer.commit_rendered_color_buffer();

        let red: [u8; 3] = [255, 0, 0];
        let black: [u8; 3] = [0, 0, 0];
        // Diagonal pixel centers (col == row) sit exactly on the
        // hypotenuse; the fill rule excludes them here, leaving only the
        // strictly-below-diagonal pixels covered.
        let expected = [
            [black, black, black, black],
            [red, black, black, black],
            [red, red, black, black],
            [red, red, red, black],
        ];
        for row in 0..4 {
            for col in 0..4 {
                let px = &pixels[(row * 4 + col) * 3..(row * 4 + col) * 3 + 3];
                assert_eq!(px, &expected[row][col][..], "row {row} col {col}");
            }
        }
    }

    #[test]
    fn scenario_b_depth_occlusion() {
        let mut renderer = Renderer::<1>::new(4, 4, identity_camera());
        renderer.add_model(
            clip_space_mesh([(-1.0, -1.0, 0.8), (3.0, -1.0, 0.8), (-1.0, 3.0, 0.8)]),
            Arc::new(Constant(Rgba::new(1.0, 0.0, 0.0, 1.0))),
            vec![MaterialSlot::default()],
        );
        renderer.model_mut(0).unwrap().state.cull_mode = CullMode::Disabled;
        renderer.add_model(
            clip_space_mesh([(-1.0, -1.0, 0.2), (3.0, -1.0, 0.2), (-1.0, 3.0, 0.2)]),
            Arc::new(Constant(Rgba::new(0.0, 1.0, 0.0, 1.0))),
            vec![MaterialSlot::default()],
        );
        renderer.model_mut(1).unwrap().state.cull_mode = CullMode::Disabled;

        renderer.begin_frame();
        renderer.render_all_models().unwrap();
        let pixels = renderer.commit_rendered_color_buffer();

        assert!(pixels.chunks(3).all(|p| p == [0, 255, 0]));
    }

    #[test]
    fn scenario_c_alpha_blend_ordering() {
        let mut renderer = Renderer::<1>::new(4, 4, identity_camera());
        let full_screen = || clip_space_mesh([(-1.0, -1.0, 0.0), (3.0, -1.0, 0.0), (-1.0, 3.0, 0.0)]);

        renderer.add_model(full_screen(), Arc::new(Constant(Rgba::new(1.0, 1.0, 1.0, 1.0))), vec![MaterialSlot::default()]);
        renderer.model_mut(0).unwrap().state.cull_mode = CullMode::Disabled;

        renderer.add_model(full_screen(), Arc::new(Constant(Rgba::new(1.0, 0.0, 0.0, 0.5))), vec![MaterialSlot::default()]);
        let transparent = renderer.model_mut(1).unwrap();
        transparent.state.cull_mode = CullMode::Disabled;
        transparent.state.alpha_blend = AlphaBlendMode::AlphaBlend;
        transparent.state.depth_write = DepthWrite::Off;
        // Both quads sit at the same NDC z; with depth test on, the second
        // draw would tie the first one's stored depth and be rejected as
        // occluded ("stored >= incoming"). Blended overlays conventionally
        // skip the depth test rather than win a synthetic z-fight.
        transparent.state.depth_test = DepthTest::Off;

        renderer.begin_frame();
        renderer.render_all_models().unwrap();
        let pixels = renderer.commit_rendered_color_buffer();

        // The blend factor is the *quantized* u8 alpha (128, from rounding
        // 0.5 * 255) read back as 128 / 255 ≈ 0.50196, not the shader's
        // exact 0.5, so the blended channels land one off from a naive
        // 0.5/0.5 mix: green/blue compute to 255 - 128 = 127 exactly. The
        // committed buffer drops alpha entirely, so only RGB is checked.
        assert!(pixels.chunks(3).all(|p| p == [255, 127, 127]), "{pixels:?}");
    }

    #[test]
    fn scenario_d_cull_back_rejects_cw_triangle() {
        // Same vertices as scenario A, but with the default `CullMode::Back`
        // left in place instead of disabled: the viewport's y-flip makes
        // this winding order back-facing in screen space (verified against
        // `signed_area` directly below), so it must be rejected.
        let mut renderer = Renderer::<1>::new(4, 4, identity_camera());
        renderer.add_model(
            clip_space_mesh([(-1.0, -1.0, 0.0), (3.0, -1.0, 0.0), (-1.0, 3.0, 0.0)]),
            Arc::new(Constant(Rgba::new(1.0, 0.0, 0.0, 1.0))),
            vec![MaterialSlot::default()],
        );

        renderer.begin_frame();
        renderer.render_all_models().unwrap();
        let pixels = renderer.commit_rendered_color_buffer();

        assert!(pixels.chunks(3).all(|p| p == [0, 0, 0]));
    }

    #[test]
    fn back_facing_screen_winding_matches_cull_rejection() {
        // Cross-check for `scenario_d_cull_back_rejects_cw_triangle`: the
        // same three NDC points, after the viewport's y-flip, have a
        // negative signed area and so are rejected by `CullMode::Back`.
        let viewport = [4, 4];
        let to_screen = |x: f32, y: f32| {
            Vec2::new((x * 0.5 + 0.5) * viewport[0] as f32, (1.0 - (y * 0.5 + 0.5)) * viewport[1] as f32)
        };
        let a = to_screen(-1.0, -1.0);
        let b = to_screen(3.0, -1.0);
        let c = to_screen(-1.0, 3.0);
        let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        assert!(area < 0.0, "area was {area}");
    }
}
