use thiserror::Error;

/// Errors that can arise while executing a draw call.
///
/// Most of the failure conditions described by the rendering pipeline are
/// *not* represented here: an unbound texture, a degenerate triangle, or a
/// fully-clipped polygon are routine and are handled silently (see the
/// `log` output at `trace` level). Only conditions that indicate the caller
/// handed the scheduler invalid buffers are surfaced as a `Result`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    /// An index buffer entry referenced a vertex outside the bounds of the
    /// vertex buffer. The offending face is skipped; the draw call
    /// otherwise continues.
    #[error("index buffer entry {index} is out of range for a vertex buffer of length {len}")]
    OutOfRangeIndex { index: u32, len: usize },

    /// `Renderer::resolve` (or an equivalent MSAA resolve) was invoked on a
    /// framebuffer that has not been rendered into this frame. This is not
    /// actually an error condition at runtime — resolving an unrendered
    /// buffer is a safe no-op — but is reported here for callers that want
    /// to detect the situation.
    #[error("resolve called on a framebuffer with no pending draw calls this frame")]
    ResolveOnUnrenderedBuffer,

    /// A draw call's requested viewport does not match the dimensions of
    /// the framebuffer it was given.
    #[error("draw call viewport {viewport:?} does not match framebuffer size {framebuffer:?}")]
    MismatchedTargets {
        viewport: [usize; 2],
        framebuffer: [usize; 2],
    },
}

pub type RenderResult<T> = Result<T, RenderError>;
