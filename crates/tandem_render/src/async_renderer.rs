//! # Async Renderer
//!
//! A [`Renderer`] that forwards work to a [`RenderDevice`] living on its own
//! worker thread.
//!
//! ```text
//!  caller thread(s)                          worker thread
//!  ─────────────────                         ─────────────
//!  set_* / draw / clear ──> RenderCommand ──> RenderDevice (&mut)
//!        │                    (queued)            │
//!        └─> LocalStateCache                      │
//!  flush / present / framebuffer ──> barrier <────┘
//!  create_* ───────────────────────> ResourceFactory (&, no queue)
//! ```
//!
//! ## Staleness
//!
//! Cache-backed queries answer with the value most recently *issued*, which
//! may not have reached the device yet. Call [`Renderer::flush`] first if the
//! device must agree.
//!
//! ## Multiple producers
//!
//! Each producer's commands keep their relative order. Commands from
//! different producers interleave in whatever order they reach the queue, and
//! a synchronizing call only covers what reached the queue before it.

use std::sync::Arc;

use tandem_core::{Dispatcher, DispatchError, DispatchStatsSnapshot};

use crate::cache::{LocalStateCache, StateKey, StateValue};
use crate::command::RenderCommand;
use crate::device::{PresentTarget, RenderDevice, ResourceFactory};
use crate::error::{RenderError, RenderResult};
use crate::params::RendererParameters;
use crate::renderer::Renderer;
use crate::types::{
    Buffer, ColorRgba32f, DepthStencilState, Framebuffer, IndexFormat, InputElementDesc,
    InputLayout, NativeShader, PixelFormat, PrimitiveTopology, RasterizerState, Rect,
    RenderTargetKind, Sampler, SamplerDesc, ShaderObject, Surface, Texture, VertexBufferBinding,
    Viewport, MAX_RENDER_TARGETS, MAX_VERTEX_SLOTS,
};

/// Renderer proxy backed by a single worker thread.
pub struct AsyncRenderer<D: RenderDevice> {
    dispatcher: Dispatcher<D, RenderCommand>,
    resources: Arc<dyn ResourceFactory>,
    cache: LocalStateCache,
    params: RendererParameters,
}

impl<D: RenderDevice> AsyncRenderer<D> {
    /// Builds the device from `params` and starts the worker.
    ///
    /// # Errors
    ///
    /// Invalid parameters, device construction failures and worker spawn
    /// failures are all fatal.
    pub fn run(params: RendererParameters, presenter: Arc<dyn PresentTarget>) -> RenderResult<Self> {
        params.validate()?;
        let device = D::create(&params, presenter)?;
        Self::attach(params, device)
    }

    /// Starts the worker around an already-built device.
    ///
    /// # Errors
    ///
    /// Invalid parameters or a worker spawn failure.
    pub fn attach(params: RendererParameters, device: D) -> RenderResult<Self> {
        params.validate()?;
        let resources = device.resources();
        let dispatcher = Dispatcher::start(&params.dispatch, device)?;

        let cache = LocalStateCache::new();
        cache.record(
            StateKey::Viewport,
            StateValue::Viewport(Viewport::full(params.width, params.height)),
        )?;

        tracing::info!(
            width = params.width,
            height = params.height,
            samples = params.samples,
            "async renderer running"
        );

        Ok(Self {
            dispatcher,
            resources,
            cache,
            params,
        })
    }

    /// Drains the queue, stops the worker and releases the device.
    ///
    /// Idempotent. Afterwards every operation except cache queries fails with
    /// [`DispatchError::QueueClosed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread died.
    pub fn shutdown(&self) -> RenderResult<()> {
        self.dispatcher.shutdown()?;
        Ok(())
    }

    /// False once shutdown has started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Commands queued but not yet picked up by the worker.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Dispatch counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.dispatcher.stats()
    }

    /// Parameters the renderer was started with.
    #[must_use]
    pub fn parameters(&self) -> &RendererParameters {
        &self.params
    }

    /// Frame buffer from the most recent [`Renderer::framebuffer`] call.
    ///
    /// Never blocks. `None` until the first read-back.
    #[must_use]
    pub fn last_framebuffer(&self) -> Option<Arc<Framebuffer>> {
        self.cache.last_framebuffer()
    }

    fn defer(&self, command: RenderCommand) -> RenderResult<()> {
        self.dispatcher.submit(command)?;
        Ok(())
    }

    fn defer_and_record(
        &self,
        command: RenderCommand,
        key: StateKey,
        value: StateValue,
    ) -> RenderResult<()> {
        self.cache.issue(key, value, || self.defer(command))
    }

    fn direct(&self) -> RenderResult<&dyn ResourceFactory> {
        if !self.dispatcher.is_running() {
            return Err(DispatchError::QueueClosed.into());
        }
        Ok(self.resources.as_ref())
    }
}

fn check_color_index(index: usize) -> RenderResult<()> {
    if index >= MAX_RENDER_TARGETS {
        return Err(RenderError::OutOfRange {
            what: "color target",
            index,
            limit: MAX_RENDER_TARGETS,
        });
    }
    Ok(())
}

fn check_target_slot(kind: RenderTargetKind, index: usize) -> RenderResult<()> {
    match kind {
        RenderTargetKind::Color => check_color_index(index),
        RenderTargetKind::DepthStencil if index == 0 => Ok(()),
        RenderTargetKind::DepthStencil => Err(RenderError::OutOfRange {
            what: "depth/stencil target",
            index,
            limit: 1,
        }),
    }
}

impl<D: RenderDevice> Renderer for AsyncRenderer<D> {
    fn set_input_layout(&self, layout: Arc<InputLayout>) -> RenderResult<()> {
        self.defer(RenderCommand::SetInputLayout(layout))
    }

    fn set_vertex_buffers(
        &self,
        start_slot: usize,
        buffers: &[Arc<Buffer>],
        strides: &[usize],
        offsets: &[usize],
    ) -> RenderResult<()> {
        if strides.len() != buffers.len() || offsets.len() != buffers.len() {
            return Err(RenderError::InvalidArgument(format!(
                "{} buffers but {} strides and {} offsets",
                buffers.len(),
                strides.len(),
                offsets.len()
            )));
        }
        let end = start_slot.saturating_add(buffers.len());
        if end > MAX_VERTEX_SLOTS {
            return Err(RenderError::OutOfRange {
                what: "vertex buffer slot",
                index: end - 1,
                limit: MAX_VERTEX_SLOTS,
            });
        }
        if buffers.is_empty() {
            return Ok(());
        }

        let bindings = buffers
            .iter()
            .zip(strides)
            .zip(offsets)
            .map(|((buffer, &stride), &offset)| VertexBufferBinding {
                buffer: Arc::clone(buffer),
                stride,
                offset,
            })
            .collect();
        self.defer(RenderCommand::SetVertexBuffers {
            start_slot,
            bindings,
        })
    }

    fn set_index_buffer(&self, buffer: Arc<Buffer>, format: IndexFormat) -> RenderResult<()> {
        self.defer(RenderCommand::SetIndexBuffer { buffer, format })
    }

    fn set_primitive_topology(&self, topology: PrimitiveTopology) -> RenderResult<()> {
        self.defer(RenderCommand::SetPrimitiveTopology(topology))
    }

    fn set_vertex_shader(&self, shader: Arc<NativeShader>) -> RenderResult<()> {
        let value = StateValue::Native(Arc::clone(&shader));
        self.defer_and_record(
            RenderCommand::SetVertexShader(shader),
            StateKey::VertexShader,
            value,
        )
    }

    fn set_vertex_shader_code(&self, code: Arc<ShaderObject>) -> RenderResult<()> {
        let value = StateValue::Code(Arc::clone(&code));
        self.defer_and_record(
            RenderCommand::SetVertexShaderCode(code),
            StateKey::VertexShaderCode,
            value,
        )
    }

    fn set_vs_variable_value(&self, name: &str, data: &[u8]) -> RenderResult<()> {
        self.defer(RenderCommand::SetVsVariableValue {
            name: name.to_string(),
            data: data.to_vec(),
        })
    }

    fn set_vs_variable_pointer(&self, name: &str, data: &[u8]) -> RenderResult<()> {
        self.defer(RenderCommand::SetVsVariablePointer {
            name: name.to_string(),
            data: data.to_vec(),
        })
    }

    fn set_vs_sampler(&self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()> {
        self.defer(RenderCommand::SetVsSampler {
            name: name.to_string(),
            sampler,
        })
    }

    fn set_pixel_shader(&self, shader: Arc<NativeShader>) -> RenderResult<()> {
        let value = StateValue::Native(Arc::clone(&shader));
        self.defer_and_record(
            RenderCommand::SetPixelShader(shader),
            StateKey::PixelShader,
            value,
        )
    }

    fn set_pixel_shader_code(&self, code: Arc<ShaderObject>) -> RenderResult<()> {
        let value = StateValue::Code(Arc::clone(&code));
        self.defer_and_record(
            RenderCommand::SetPixelShaderCode(code),
            StateKey::PixelShaderCode,
            value,
        )
    }

    fn set_ps_variable(&self, name: &str, data: &[u8]) -> RenderResult<()> {
        self.defer(RenderCommand::SetPsVariable {
            name: name.to_string(),
            data: data.to_vec(),
        })
    }

    fn set_ps_sampler(&self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()> {
        self.defer(RenderCommand::SetPsSampler {
            name: name.to_string(),
            sampler,
        })
    }

    fn set_blend_shader(&self, shader: Arc<NativeShader>) -> RenderResult<()> {
        self.defer(RenderCommand::SetBlendShader(shader))
    }

    fn set_rasterizer_state(&self, state: RasterizerState) -> RenderResult<()> {
        self.defer(RenderCommand::SetRasterizerState(state))
    }

    fn set_depth_stencil_state(
        &self,
        state: DepthStencilState,
        stencil_ref: i32,
    ) -> RenderResult<()> {
        self.defer(RenderCommand::SetDepthStencilState { state, stencil_ref })
    }

    fn set_viewport(&self, viewport: Viewport) -> RenderResult<()> {
        self.defer_and_record(
            RenderCommand::SetViewport(viewport),
            StateKey::Viewport,
            StateValue::Viewport(viewport),
        )
    }

    fn set_framebuffer_size(
        &self,
        width: usize,
        height: usize,
        samples: usize,
    ) -> RenderResult<()> {
        self.defer(RenderCommand::SetFramebufferSize {
            width,
            height,
            samples,
        })
    }

    fn set_framebuffer_format(&self, format: PixelFormat) -> RenderResult<()> {
        self.defer(RenderCommand::SetFramebufferFormat(format))
    }

    fn set_render_target_available(
        &self,
        kind: RenderTargetKind,
        index: usize,
        available: bool,
    ) -> RenderResult<()> {
        check_target_slot(kind, index)?;
        self.defer(RenderCommand::SetRenderTargetAvailable {
            kind,
            index,
            available,
        })
    }

    fn set_render_target(
        &self,
        kind: RenderTargetKind,
        index: usize,
        surface: Option<Arc<Surface>>,
    ) -> RenderResult<()> {
        check_target_slot(kind, index)?;
        self.defer(RenderCommand::SetRenderTarget {
            kind,
            index,
            surface,
        })
    }

    fn draw(&self, start_vertex: usize, primitive_count: usize) -> RenderResult<()> {
        self.defer(RenderCommand::Draw {
            start_vertex,
            primitive_count,
        })
    }

    fn draw_index(
        &self,
        start_index: usize,
        primitive_count: usize,
        base_vertex: i32,
    ) -> RenderResult<()> {
        self.defer(RenderCommand::DrawIndex {
            start_index,
            primitive_count,
            base_vertex,
        })
    }

    fn clear_color(&self, index: usize, color: ColorRgba32f) -> RenderResult<()> {
        check_color_index(index)?;
        self.defer(RenderCommand::ClearColor {
            index,
            region: None,
            color,
        })
    }

    fn clear_color_rect(&self, index: usize, rect: Rect, color: ColorRgba32f) -> RenderResult<()> {
        check_color_index(index)?;
        self.defer(RenderCommand::ClearColor {
            index,
            region: Some(rect),
            color,
        })
    }

    fn clear_depth(&self, depth: f32) -> RenderResult<()> {
        self.defer(RenderCommand::ClearDepth {
            region: None,
            depth,
        })
    }

    fn clear_depth_rect(&self, rect: Rect, depth: f32) -> RenderResult<()> {
        self.defer(RenderCommand::ClearDepth {
            region: Some(rect),
            depth,
        })
    }

    fn clear_stencil(&self, stencil: u32) -> RenderResult<()> {
        self.defer(RenderCommand::ClearStencil {
            region: None,
            stencil,
        })
    }

    fn clear_stencil_rect(&self, rect: Rect, stencil: u32) -> RenderResult<()> {
        self.defer(RenderCommand::ClearStencil {
            region: Some(rect),
            stencil,
        })
    }

    fn flush(&self) -> RenderResult<()> {
        self.dispatcher.submit_and_wait(RenderCommand::Flush)?
    }

    fn present(&self) -> RenderResult<()> {
        self.dispatcher.submit_and_wait(RenderCommand::Present)?
    }

    fn framebuffer(&self) -> RenderResult<Arc<Framebuffer>> {
        let framebuffer = self
            .dispatcher
            .submit_and_wait(RenderCommand::ReadFramebuffer)?;
        self.cache.record(
            StateKey::LastFramebuffer,
            StateValue::Framebuffer(Arc::clone(&framebuffer)),
        )?;
        Ok(framebuffer)
    }

    fn create_buffer(&self, size: usize) -> RenderResult<Arc<Buffer>> {
        self.direct()?.create_buffer(size)
    }

    fn create_tex2d(
        &self,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> RenderResult<Arc<Texture>> {
        self.direct()?.create_tex2d(width, height, samples, format)
    }

    fn create_texcube(
        &self,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> RenderResult<Arc<Texture>> {
        self.direct()?.create_texcube(width, height, samples, format)
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> RenderResult<Arc<Sampler>> {
        self.direct()?.create_sampler(desc)
    }

    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<ShaderObject>,
    ) -> RenderResult<Arc<InputLayout>> {
        self.direct()?.create_input_layout(elements, shader)
    }

    fn create_input_layout_native(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<NativeShader>,
    ) -> RenderResult<Arc<InputLayout>> {
        self.direct()?.create_input_layout_native(elements, shader)
    }

    /// Last vertex shader *issued*; may not be bound on the device yet.
    fn vertex_shader(&self) -> RenderResult<Option<Arc<NativeShader>>> {
        self.cache.native(StateKey::VertexShader)
    }

    /// Last vertex shader code *issued*; may not be bound on the device yet.
    fn vertex_shader_code(&self) -> RenderResult<Option<Arc<ShaderObject>>> {
        self.cache.code(StateKey::VertexShaderCode)
    }

    /// Last pixel shader *issued*; may not be bound on the device yet.
    fn pixel_shader(&self) -> RenderResult<Option<Arc<NativeShader>>> {
        self.cache.native(StateKey::PixelShader)
    }

    /// Last pixel shader code *issued*; may not be bound on the device yet.
    fn pixel_shader_code(&self) -> RenderResult<Option<Arc<ShaderObject>>> {
        self.cache.code(StateKey::PixelShaderCode)
    }

    /// Last viewport *issued*; seeded with the full frame at start.
    fn viewport(&self) -> RenderResult<Viewport> {
        self.cache.viewport().ok_or(RenderError::MissingState("viewport"))
    }

    fn index_buffer(&self) -> RenderResult<Option<Arc<Buffer>>> {
        Err(RenderError::UntrackedState(StateKey::IndexBuffer))
    }

    fn index_format(&self) -> RenderResult<IndexFormat> {
        Err(RenderError::UntrackedState(StateKey::IndexFormat))
    }

    fn primitive_topology(&self) -> RenderResult<PrimitiveTopology> {
        Err(RenderError::UntrackedState(StateKey::PrimitiveTopology))
    }

    fn rasterizer_state(&self) -> RenderResult<RasterizerState> {
        Err(RenderError::UntrackedState(StateKey::RasterizerState))
    }

    fn blend_shader(&self) -> RenderResult<Option<Arc<NativeShader>>> {
        Err(RenderError::UntrackedState(StateKey::BlendShader))
    }

    fn framebuffer_format(&self) -> RenderResult<PixelFormat> {
        Err(RenderError::UntrackedState(StateKey::FramebufferFormat))
    }

    fn framebuffer_size(&self) -> RenderResult<Rect> {
        Err(RenderError::UntrackedState(StateKey::FramebufferSize))
    }

    fn render_target_available(
        &self,
        _kind: RenderTargetKind,
        _index: usize,
    ) -> RenderResult<bool> {
        Err(RenderError::UntrackedState(StateKey::RenderTargetAvailable))
    }
}
