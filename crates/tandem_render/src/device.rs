//! # Device Traits
//!
//! A rendering backend is split in two halves:
//!
//! ```text
//!                 ┌───────────────────────┐
//!   worker only ─>│ RenderDevice (&mut)   │  state, draws, clears, present
//!                 └──────────┬────────────┘
//!                            │ resources()
//!                 ┌──────────▼────────────┐
//!   any thread ──>│ ResourceFactory (&)   │  buffers, textures, layouts
//!                 └───────────────────────┘
//! ```
//!
//! The queued half is `&mut self` and only ever touched by the worker that
//! owns it. The direct half is `Send + Sync` and may run concurrently with the
//! worker, so an implementation cannot share unsynchronized state between the
//! two.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RenderResult;
use crate::params::RendererParameters;
use crate::types::{
    Buffer, ColorRgba32f, DepthStencilState, Framebuffer, IndexFormat, InputElementDesc,
    InputLayout, NativeShader, PixelFormat, PrimitiveTopology, RasterizerState, Rect,
    RenderTargetKind, Sampler, SamplerDesc, ShaderObject, Surface, Texture, VertexBufferBinding,
    Viewport,
};

/// External sink for presented frames (a window, a file, a test harness).
pub trait PresentTarget: Send + Sync {
    /// Receives a finished frame.
    ///
    /// # Errors
    ///
    /// Implementation-defined; surfaced to the caller of `present`.
    fn present(&self, frame: Arc<Framebuffer>) -> RenderResult<()>;
}

/// Presenter that keeps the last frame in memory.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    frames: AtomicU64,
    last: Mutex<Option<Arc<Framebuffer>>>,
}

impl HeadlessPresenter {
    /// Creates an empty presenter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames presented so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// The most recently presented frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<Arc<Framebuffer>> {
        self.last.lock().clone()
    }
}

impl PresentTarget for HeadlessPresenter {
    fn present(&self, frame: Arc<Framebuffer>) -> RenderResult<()> {
        *self.last.lock() = Some(frame);
        self.frames.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Resource creation, callable from any thread without queuing.
pub trait ResourceFactory: Send + Sync {
    /// Creates a linear buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Fails for a zero size.
    fn create_buffer(&self, size: usize) -> RenderResult<Arc<Buffer>>;

    /// Creates a 2D texture.
    ///
    /// # Errors
    ///
    /// Fails for an invalid extent or sample count.
    fn create_tex2d(
        &self,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> RenderResult<Arc<Texture>>;

    /// Creates a cube texture.
    ///
    /// # Errors
    ///
    /// Fails for an invalid or non-square extent.
    fn create_texcube(
        &self,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> RenderResult<Arc<Texture>>;

    /// Creates a sampler.
    ///
    /// # Errors
    ///
    /// Fails for an invalid description.
    fn create_sampler(&self, desc: &SamplerDesc) -> RenderResult<Arc<Sampler>>;

    /// Creates an input layout checked against compiled shader code.
    ///
    /// # Errors
    ///
    /// Fails if an element names a semantic the code does not consume.
    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<ShaderObject>,
    ) -> RenderResult<Arc<InputLayout>>;

    /// Creates an input layout for a native vertex shader.
    ///
    /// # Errors
    ///
    /// Fails if the shader is not a vertex shader.
    fn create_input_layout_native(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<NativeShader>,
    ) -> RenderResult<Arc<InputLayout>>;
}

/// The queued half of a rendering backend. Driven by exactly one worker.
pub trait RenderDevice: Send + 'static {
    /// Builds the device for the given parameters and presentation target.
    ///
    /// # Errors
    ///
    /// Construction failures are fatal for the renderer.
    fn create(params: &RendererParameters, presenter: Arc<dyn PresentTarget>) -> RenderResult<Self>
    where
        Self: Sized;

    /// The direct-path half, shared with callers.
    fn resources(&self) -> Arc<dyn ResourceFactory>;

    /// Binds the vertex input layout.
    fn set_input_layout(&mut self, layout: Arc<InputLayout>) -> RenderResult<()>;

    /// Binds vertex buffers to consecutive slots starting at `start_slot`.
    fn set_vertex_buffers(
        &mut self,
        start_slot: usize,
        bindings: Vec<VertexBufferBinding>,
    ) -> RenderResult<()>;

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, buffer: Arc<Buffer>, format: IndexFormat) -> RenderResult<()>;

    /// Sets the primitive topology.
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> RenderResult<()>;

    /// Binds a native vertex shader.
    fn set_vertex_shader(&mut self, shader: Arc<NativeShader>) -> RenderResult<()>;

    /// Binds compiled vertex shader code.
    fn set_vertex_shader_code(&mut self, code: Arc<ShaderObject>) -> RenderResult<()>;

    /// Sets a vertex shader variable by value.
    fn set_vs_variable_value(&mut self, name: &str, data: &[u8]) -> RenderResult<()>;

    /// Sets a vertex shader variable that the shader reads through a pointer.
    fn set_vs_variable_pointer(&mut self, name: &str, data: &[u8]) -> RenderResult<()>;

    /// Binds a vertex shader sampler.
    fn set_vs_sampler(&mut self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()>;

    /// Binds a native pixel shader.
    fn set_pixel_shader(&mut self, shader: Arc<NativeShader>) -> RenderResult<()>;

    /// Binds compiled pixel shader code.
    fn set_pixel_shader_code(&mut self, code: Arc<ShaderObject>) -> RenderResult<()>;

    /// Sets a pixel shader variable.
    fn set_ps_variable(&mut self, name: &str, data: &[u8]) -> RenderResult<()>;

    /// Binds a pixel shader sampler.
    fn set_ps_sampler(&mut self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()>;

    /// Binds the blend shader.
    fn set_blend_shader(&mut self, shader: Arc<NativeShader>) -> RenderResult<()>;

    /// Sets the rasterizer state.
    fn set_rasterizer_state(&mut self, state: RasterizerState) -> RenderResult<()>;

    /// Sets the depth/stencil state and stencil reference.
    fn set_depth_stencil_state(
        &mut self,
        state: DepthStencilState,
        stencil_ref: i32,
    ) -> RenderResult<()>;

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport) -> RenderResult<()>;

    /// Resizes the frame buffer.
    fn set_framebuffer_size(
        &mut self,
        width: usize,
        height: usize,
        samples: usize,
    ) -> RenderResult<()>;

    /// Changes the frame buffer color format.
    fn set_framebuffer_format(&mut self, format: PixelFormat) -> RenderResult<()>;

    /// Enables or disables a render target slot.
    fn set_render_target_available(
        &mut self,
        kind: RenderTargetKind,
        index: usize,
        available: bool,
    ) -> RenderResult<()>;

    /// Attaches a surface to a render target slot, or detaches with `None`.
    fn set_render_target(
        &mut self,
        kind: RenderTargetKind,
        index: usize,
        surface: Option<Arc<Surface>>,
    ) -> RenderResult<()>;

    /// Non-indexed draw.
    fn draw(&mut self, start_vertex: usize, primitive_count: usize) -> RenderResult<()>;

    /// Indexed draw.
    fn draw_index(
        &mut self,
        start_index: usize,
        primitive_count: usize,
        base_vertex: i32,
    ) -> RenderResult<()>;

    /// Clears a color target, or a rectangle of it.
    fn clear_color(
        &mut self,
        index: usize,
        region: Option<Rect>,
        color: ColorRgba32f,
    ) -> RenderResult<()>;

    /// Clears depth, or a rectangle of it.
    fn clear_depth(&mut self, region: Option<Rect>, depth: f32) -> RenderResult<()>;

    /// Clears stencil, or a rectangle of it.
    fn clear_stencil(&mut self, region: Option<Rect>, stencil: u32) -> RenderResult<()>;

    /// Finishes all submitted work.
    ///
    /// # Errors
    ///
    /// Surfaced to the synchronizing caller.
    fn flush(&mut self) -> RenderResult<()>;

    /// Hands the current frame to the presentation target.
    ///
    /// # Errors
    ///
    /// Surfaced to the synchronizing caller.
    fn present(&mut self) -> RenderResult<()>;

    /// Snapshot of the current frame buffer.
    fn framebuffer(&self) -> Arc<Framebuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_presenter_keeps_last_frame() {
        let presenter = HeadlessPresenter::new();
        assert_eq!(presenter.frames(), 0);
        assert!(presenter.last_frame().is_none());

        let frame = Arc::new(Framebuffer::new(2, 2, 1, PixelFormat::Rgba8Unorm));
        presenter.present(Arc::clone(&frame)).unwrap();
        presenter.present(Arc::clone(&frame)).unwrap();

        assert_eq!(presenter.frames(), 2);
        assert!(presenter
            .last_frame()
            .is_some_and(|last| Arc::ptr_eq(&last, &frame)));
    }
}
