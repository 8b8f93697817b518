//! A parallel, CPU-side software rasterizer core: clipping, edge-function
//! rasterization with MSAA, mipmapped texture sampling, a fixed-function
//! shading pipeline, and a two-filter draw-call scheduler.
//!
//! The crate is library-only: it has no file I/O, windowing, or GPU backend
//! of its own. A caller uploads mesh/texture data, assembles `Model`s, and
//! drives a `Renderer` to produce a tightly packed RGB byte buffer.

pub mod clip;
pub mod error;
pub mod framebuffer;
pub mod interpolate;
pub mod light;
pub mod mesh;
pub mod model;
pub mod rasterizer;
pub mod renderer;
pub mod sampler;
pub mod scheduler;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use error::{RenderError, RenderResult};
pub use framebuffer::{FrameBuffer, Rgba8};
pub use interpolate::Interpolate;
pub use light::{Light, LightRegistry};
pub use mesh::{Mesh, Submesh};
pub use model::{AlphaBlendMode, CullMode, DepthTest, DepthWrite, Lighting, MaterialSlot, Model, RenderState};
pub use renderer::{Camera, FrameSettings, Renderer};
pub use scheduler::{DrawCall, Scheduler};
pub use shader::{
    AlphaBlend, BlinnPhong, BlinnPhongNormalMapped, FragmentShader, LodVisualize, Material, Passthrough, Phong,
    TextureBindings, Textured, Uniforms,
};
pub use texture::{FilterMode, Layout, Texture, TextureId, TextureStore, WrapMode};
pub use vertex::{VertexData, VertexInput};
