//! Per-model render state and the `Model` type the renderer facade iterates
//! over.

use std::sync::Arc;

use vek::Mat4;

use crate::mesh::Mesh;
use crate::shader::{FragmentShader, Material, TextureBindings};

/// Which winding order to discard; default `Back`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CullMode {
    Disabled,
    Front,
    #[default]
    Back,
}

/// Default `On`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthTest {
    Off,
    On,
}

impl Default for DepthTest {
    fn default() -> Self {
        DepthTest::On
    }
}

/// Default `On`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthWrite {
    Off,
    On,
}

impl Default for DepthWrite {
    fn default() -> Self {
        DepthWrite::On
    }
}

/// Default `Disabled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AlphaBlendMode {
    #[default]
    Disabled,
    AlphaBlend,
    AlphaToCoverage,
}

/// Default `On`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lighting {
    Off,
    On,
}

impl Default for Lighting {
    fn default() -> Self {
        Lighting::On
    }
}

/// Per-model render state, snapshotted into a `DrawCall`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderState {
    pub cull_mode: CullMode,
    pub depth_test: DepthTest,
    pub depth_write: DepthWrite,
    pub alpha_blend: AlphaBlendMode,
    pub lighting: Lighting,
}

/// One material slot: coefficients plus the texture bindings that go with
/// them, both indexed in parallel with `Mesh::submeshes`' `material` field.
#[derive(Clone, Default)]
pub struct MaterialSlot {
    pub material: Material,
    pub textures: TextureBindings,
}

/// A drawable object: shared mesh data, per-model transform, render state,
/// shader, and material slots. Textures are owned by a process-wide store;
/// framebuffers are owned by the renderer.
pub struct Model {
    mesh: Arc<Mesh>,
    model_matrix: Mat4<f32>,
    pub state: RenderState,
    pub materials: Vec<MaterialSlot>,
    pub shader: Arc<dyn FragmentShader>,
}

impl Model {
    pub fn new(mesh: Arc<Mesh>, shader: Arc<dyn FragmentShader>, materials: Vec<MaterialSlot>) -> Self {
        Self {
            mesh,
            model_matrix: Mat4::identity(),
            state: RenderState::default(),
            materials,
            shader,
        }
    }

    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[inline]
    pub fn model_matrix(&self) -> Mat4<f32> {
        self.model_matrix
    }

    /// Callers must not call this while a draw from this model is in
    /// flight.
    pub fn set_model_matrix(&mut self, matrix: Mat4<f32>) {
        self.model_matrix = matrix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let state = RenderState::default();
        assert_eq!(state.cull_mode, CullMode::Back);
        assert_eq!(state.depth_test, DepthTest::On);
        assert_eq!(state.depth_write, DepthWrite::On);
        assert_eq!(state.alpha_blend, AlphaBlendMode::Disabled);
        assert_eq!(state.lighting, Lighting::On);
    }
}
