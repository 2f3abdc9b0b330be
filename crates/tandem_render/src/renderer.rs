//! # Renderer Interface
//!
//! The caller-facing surface. All methods take `&self`, so one renderer can be
//! shared across threads behind an `Arc`.
//!
//! Every method belongs to one of four groups:
//!
//! | Group | Returns when | Errors reported |
//! |---|---|---|
//! | Deferred (`set_*`, `draw*`, `clear_*`) | the command is queued | issue-time only |
//! | Synchronizing (`flush`, `present`, `framebuffer`) | the device is done | everything |
//! | Direct (`create_*`) | the resource exists | everything |
//! | Queries | immediately | untracked state |

use std::sync::Arc;

use bytemuck::Pod;

use crate::error::RenderResult;
use crate::types::{
    Buffer, ColorRgba32f, DepthStencilState, Framebuffer, IndexFormat, InputElementDesc,
    InputLayout, NativeShader, PixelFormat, PrimitiveTopology, RasterizerState, Rect,
    RenderTargetKind, Sampler, SamplerDesc, ShaderObject, Surface, Texture, Viewport,
};

/// Object-safe renderer API.
pub trait Renderer: Send + Sync {
    // -------------------------------------------------------------------------
    // Input assembly
    // -------------------------------------------------------------------------

    /// Binds the vertex input layout.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_input_layout(&self, layout: Arc<InputLayout>) -> RenderResult<()>;

    /// Binds `buffers.len()` vertex buffers starting at `start_slot`.
    ///
    /// The three slices are copied before this returns.
    ///
    /// # Errors
    ///
    /// Fails if the slice lengths differ, the slots run past the limit, or
    /// the renderer is shut down.
    fn set_vertex_buffers(
        &self,
        start_slot: usize,
        buffers: &[Arc<Buffer>],
        strides: &[usize],
        offsets: &[usize],
    ) -> RenderResult<()>;

    /// Binds the index buffer.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_index_buffer(&self, buffer: Arc<Buffer>, format: IndexFormat) -> RenderResult<()>;

    /// Sets the primitive topology.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_primitive_topology(&self, topology: PrimitiveTopology) -> RenderResult<()>;

    // -------------------------------------------------------------------------
    // Shaders
    // -------------------------------------------------------------------------

    /// Binds a native vertex shader.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_vertex_shader(&self, shader: Arc<NativeShader>) -> RenderResult<()>;

    /// Binds compiled vertex shader code.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_vertex_shader_code(&self, code: Arc<ShaderObject>) -> RenderResult<()>;

    /// Sets a vertex shader variable from raw bytes. The bytes are copied.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_vs_variable_value(&self, name: &str, data: &[u8]) -> RenderResult<()>;

    /// Sets a pointer-typed vertex shader variable from raw bytes. The bytes
    /// are copied; the shader sees the copy, not the caller's memory.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_vs_variable_pointer(&self, name: &str, data: &[u8]) -> RenderResult<()>;

    /// Binds a vertex shader sampler.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_vs_sampler(&self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()>;

    /// Binds a native pixel shader.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_pixel_shader(&self, shader: Arc<NativeShader>) -> RenderResult<()>;

    /// Binds compiled pixel shader code.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_pixel_shader_code(&self, code: Arc<ShaderObject>) -> RenderResult<()>;

    /// Sets a pixel shader variable from raw bytes. The bytes are copied.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_ps_variable(&self, name: &str, data: &[u8]) -> RenderResult<()>;

    /// Binds a pixel shader sampler.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_ps_sampler(&self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()>;

    /// Binds the blend shader.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_blend_shader(&self, shader: Arc<NativeShader>) -> RenderResult<()>;

    // -------------------------------------------------------------------------
    // Fixed-function state
    // -------------------------------------------------------------------------

    /// Sets the rasterizer state.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_rasterizer_state(&self, state: RasterizerState) -> RenderResult<()>;

    /// Sets the depth/stencil state and stencil reference value.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_depth_stencil_state(&self, state: DepthStencilState, stencil_ref: i32)
        -> RenderResult<()>;

    /// Sets the viewport.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_viewport(&self, viewport: Viewport) -> RenderResult<()>;

    // -------------------------------------------------------------------------
    // Frame buffer
    // -------------------------------------------------------------------------

    /// Resizes the frame buffer. Contents are reset.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_framebuffer_size(&self, width: usize, height: usize, samples: usize)
        -> RenderResult<()>;

    /// Changes the frame buffer color format.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn set_framebuffer_format(&self, format: PixelFormat) -> RenderResult<()>;

    /// Enables or disables a render target slot.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range slot or after shutdown.
    fn set_render_target_available(
        &self,
        kind: RenderTargetKind,
        index: usize,
        available: bool,
    ) -> RenderResult<()>;

    /// Attaches (or with `None`, detaches) a surface.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range slot or after shutdown.
    fn set_render_target(
        &self,
        kind: RenderTargetKind,
        index: usize,
        surface: Option<Arc<Surface>>,
    ) -> RenderResult<()>;

    // -------------------------------------------------------------------------
    // Draws and clears
    // -------------------------------------------------------------------------

    /// Non-indexed draw.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down. Missing pipeline state is a
    /// device-side failure and is not reported here.
    fn draw(&self, start_vertex: usize, primitive_count: usize) -> RenderResult<()>;

    /// Indexed draw.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn draw_index(
        &self,
        start_index: usize,
        primitive_count: usize,
        base_vertex: i32,
    ) -> RenderResult<()>;

    /// Clears color target `index`.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range target or after shutdown.
    fn clear_color(&self, index: usize, color: ColorRgba32f) -> RenderResult<()>;

    /// Clears a rectangle of color target `index`.
    ///
    /// # Errors
    ///
    /// Fails for an out-of-range target or after shutdown.
    fn clear_color_rect(&self, index: usize, rect: Rect, color: ColorRgba32f) -> RenderResult<()>;

    /// Clears depth.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn clear_depth(&self, depth: f32) -> RenderResult<()>;

    /// Clears a rectangle of depth.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn clear_depth_rect(&self, rect: Rect, depth: f32) -> RenderResult<()>;

    /// Clears stencil.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn clear_stencil(&self, stencil: u32) -> RenderResult<()>;

    /// Clears a rectangle of stencil.
    ///
    /// # Errors
    ///
    /// Fails only if the renderer is shut down.
    fn clear_stencil_rect(&self, rect: Rect, stencil: u32) -> RenderResult<()>;

    // -------------------------------------------------------------------------
    // Synchronization
    // -------------------------------------------------------------------------

    /// Blocks until everything issued earlier has executed and the device
    /// finished its work.
    ///
    /// # Errors
    ///
    /// The device's own flush result, or a dispatch failure.
    fn flush(&self) -> RenderResult<()>;

    /// Blocks until the current frame has been handed to the presentation
    /// target.
    ///
    /// # Errors
    ///
    /// The device's own present result, or a dispatch failure.
    fn present(&self) -> RenderResult<()>;

    /// Blocks until everything issued earlier has executed, then returns a
    /// frame-buffer snapshot.
    ///
    /// # Errors
    ///
    /// Dispatch failures only.
    fn framebuffer(&self) -> RenderResult<Arc<Framebuffer>>;

    // -------------------------------------------------------------------------
    // Resources
    // -------------------------------------------------------------------------

    /// Creates a buffer.
    ///
    /// # Errors
    ///
    /// Device validation failures.
    fn create_buffer(&self, size: usize) -> RenderResult<Arc<Buffer>>;

    /// Creates a 2D texture.
    ///
    /// # Errors
    ///
    /// Device validation failures.
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
    /// Device validation failures.
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
    /// Device validation failures.
    fn create_sampler(&self, desc: &SamplerDesc) -> RenderResult<Arc<Sampler>>;

    /// Creates an input layout against compiled shader code.
    ///
    /// # Errors
    ///
    /// Device validation failures.
    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<ShaderObject>,
    ) -> RenderResult<Arc<InputLayout>>;

    /// Creates an input layout for a native vertex shader.
    ///
    /// # Errors
    ///
    /// Device validation failures.
    fn create_input_layout_native(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<NativeShader>,
    ) -> RenderResult<Arc<InputLayout>>;

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Bound native vertex shader.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn vertex_shader(&self) -> RenderResult<Option<Arc<NativeShader>>>;

    /// Bound vertex shader code.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn vertex_shader_code(&self) -> RenderResult<Option<Arc<ShaderObject>>>;

    /// Bound native pixel shader.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn pixel_shader(&self) -> RenderResult<Option<Arc<NativeShader>>>;

    /// Bound pixel shader code.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn pixel_shader_code(&self) -> RenderResult<Option<Arc<ShaderObject>>>;

    /// Current viewport.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn viewport(&self) -> RenderResult<Viewport>;

    /// Bound index buffer.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn index_buffer(&self) -> RenderResult<Option<Arc<Buffer>>>;

    /// Bound index format.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn index_format(&self) -> RenderResult<IndexFormat>;

    /// Current primitive topology.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn primitive_topology(&self) -> RenderResult<PrimitiveTopology>;

    /// Current rasterizer state.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn rasterizer_state(&self) -> RenderResult<RasterizerState>;

    /// Bound blend shader.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn blend_shader(&self) -> RenderResult<Option<Arc<NativeShader>>>;

    /// Frame buffer color format.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn framebuffer_format(&self) -> RenderResult<PixelFormat>;

    /// Frame buffer extent as a rectangle at the origin.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn framebuffer_size(&self) -> RenderResult<Rect>;

    /// Whether a render target slot is enabled.
    ///
    /// # Errors
    ///
    /// Fails if the implementation cannot answer.
    fn render_target_available(&self, kind: RenderTargetKind, index: usize)
        -> RenderResult<bool>;

    // -------------------------------------------------------------------------
    // Typed helpers
    // -------------------------------------------------------------------------

    /// Sets a vertex shader variable from a plain-old-data value.
    ///
    /// # Errors
    ///
    /// See [`set_vs_variable_value`](Self::set_vs_variable_value).
    fn set_vs_variable_typed<T: Pod>(&self, name: &str, value: &T) -> RenderResult<()>
    where
        Self: Sized,
    {
        self.set_vs_variable_value(name, bytemuck::bytes_of(value))
    }

    /// Sets a pixel shader variable from a plain-old-data value.
    ///
    /// # Errors
    ///
    /// See [`set_ps_variable`](Self::set_ps_variable).
    fn set_ps_variable_typed<T: Pod>(&self, name: &str, value: &T) -> RenderResult<()>
    where
        Self: Sized,
    {
        self.set_ps_variable(name, bytemuck::bytes_of(value))
    }
}
