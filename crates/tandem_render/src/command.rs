//! # Render Commands
//!
//! One variant per queued operation. Every variant owns its arguments:
//! resources by `Arc`, byte payloads and slot arrays by value, so nothing
//! borrowed from the caller outlives the call that issued it.

use std::sync::Arc;

use tandem_core::{Command, Signal};

use crate::device::RenderDevice;
use crate::error::{RenderError, RenderResult};
use crate::types::{
    Buffer, ColorRgba32f, DepthStencilState, Framebuffer, IndexFormat, InputLayout, NativeShader,
    PixelFormat, PrimitiveTopology, RasterizerState, Rect, RenderTargetKind, Sampler,
    ShaderObject, Surface, VertexBufferBinding, Viewport,
};

/// A deferred or synchronizing renderer operation.
///
/// Variants map one-to-one onto [`RenderDevice`] methods.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum RenderCommand {
    SetInputLayout(Arc<InputLayout>),
    SetVertexBuffers {
        start_slot: usize,
        bindings: Vec<VertexBufferBinding>,
    },
    SetIndexBuffer {
        buffer: Arc<Buffer>,
        format: IndexFormat,
    },
    SetPrimitiveTopology(PrimitiveTopology),
    SetVertexShader(Arc<NativeShader>),
    SetVertexShaderCode(Arc<ShaderObject>),
    SetVsVariableValue { name: String, data: Vec<u8> },
    SetVsVariablePointer { name: String, data: Vec<u8> },
    SetVsSampler { name: String, sampler: Arc<Sampler> },
    SetPixelShader(Arc<NativeShader>),
    SetPixelShaderCode(Arc<ShaderObject>),
    SetPsVariable { name: String, data: Vec<u8> },
    SetPsSampler { name: String, sampler: Arc<Sampler> },
    SetBlendShader(Arc<NativeShader>),
    SetRasterizerState(RasterizerState),
    SetDepthStencilState {
        state: DepthStencilState,
        stencil_ref: i32,
    },
    SetViewport(Viewport),
    SetFramebufferSize {
        width: usize,
        height: usize,
        samples: usize,
    },
    SetFramebufferFormat(PixelFormat),
    SetRenderTargetAvailable {
        kind: RenderTargetKind,
        index: usize,
        available: bool,
    },
    SetRenderTarget {
        kind: RenderTargetKind,
        index: usize,
        surface: Option<Arc<Surface>>,
    },
    Draw {
        start_vertex: usize,
        primitive_count: usize,
    },
    DrawIndex {
        start_index: usize,
        primitive_count: usize,
        base_vertex: i32,
    },
    ClearColor {
        index: usize,
        region: Option<Rect>,
        color: ColorRgba32f,
    },
    ClearDepth { region: Option<Rect>, depth: f32 },
    ClearStencil { region: Option<Rect>, stencil: u32 },
    /// Synchronizing: reports the device's flush result.
    Flush(Signal<RenderResult<()>>),
    /// Synchronizing: reports the device's present result.
    Present(Signal<RenderResult<()>>),
    /// Synchronizing: reports a frame-buffer snapshot.
    ReadFramebuffer(Signal<Arc<Framebuffer>>),
}

impl<D: RenderDevice> Command<D> for RenderCommand {
    type Error = RenderError;

    fn label(&self) -> &'static str {
        match self {
            Self::SetInputLayout(_) => "set_input_layout",
            Self::SetVertexBuffers { .. } => "set_vertex_buffers",
            Self::SetIndexBuffer { .. } => "set_index_buffer",
            Self::SetPrimitiveTopology(_) => "set_primitive_topology",
            Self::SetVertexShader(_) => "set_vertex_shader",
            Self::SetVertexShaderCode(_) => "set_vertex_shader_code",
            Self::SetVsVariableValue { .. } => "set_vs_variable_value",
            Self::SetVsVariablePointer { .. } => "set_vs_variable_pointer",
            Self::SetVsSampler { .. } => "set_vs_sampler",
            Self::SetPixelShader(_) => "set_pixel_shader",
            Self::SetPixelShaderCode(_) => "set_pixel_shader_code",
            Self::SetPsVariable { .. } => "set_ps_variable",
            Self::SetPsSampler { .. } => "set_ps_sampler",
            Self::SetBlendShader(_) => "set_blend_shader",
            Self::SetRasterizerState(_) => "set_rasterizer_state",
            Self::SetDepthStencilState { .. } => "set_depth_stencil_state",
            Self::SetViewport(_) => "set_viewport",
            Self::SetFramebufferSize { .. } => "set_framebuffer_size",
            Self::SetFramebufferFormat(_) => "set_framebuffer_format",
            Self::SetRenderTargetAvailable { .. } => "set_render_target_available",
            Self::SetRenderTarget { .. } => "set_render_target",
            Self::Draw { .. } => "draw",
            Self::DrawIndex { .. } => "draw_index",
            Self::ClearColor { .. } => "clear_color",
            Self::ClearDepth { .. } => "clear_depth",
            Self::ClearStencil { .. } => "clear_stencil",
            Self::Flush(_) => "flush",
            Self::Present(_) => "present",
            Self::ReadFramebuffer(_) => "read_framebuffer",
        }
    }

    fn execute(self, device: &mut D) -> Result<(), Self::Error> {
        match self {
            Self::SetInputLayout(layout) => device.set_input_layout(layout),
            Self::SetVertexBuffers {
                start_slot,
                bindings,
            } => device.set_vertex_buffers(start_slot, bindings),
            Self::SetIndexBuffer { buffer, format } => device.set_index_buffer(buffer, format),
            Self::SetPrimitiveTopology(topology) => device.set_primitive_topology(topology),
            Self::SetVertexShader(shader) => device.set_vertex_shader(shader),
            Self::SetVertexShaderCode(code) => device.set_vertex_shader_code(code),
            Self::SetVsVariableValue { name, data } => device.set_vs_variable_value(&name, &data),
            Self::SetVsVariablePointer { name, data } => {
                device.set_vs_variable_pointer(&name, &data)
            }
            Self::SetVsSampler { name, sampler } => device.set_vs_sampler(&name, sampler),
            Self::SetPixelShader(shader) => device.set_pixel_shader(shader),
            Self::SetPixelShaderCode(code) => device.set_pixel_shader_code(code),
            Self::SetPsVariable { name, data } => device.set_ps_variable(&name, &data),
            Self::SetPsSampler { name, sampler } => device.set_ps_sampler(&name, sampler),
            Self::SetBlendShader(shader) => device.set_blend_shader(shader),
            Self::SetRasterizerState(state) => device.set_rasterizer_state(state),
            Self::SetDepthStencilState { state, stencil_ref } => {
                device.set_depth_stencil_state(state, stencil_ref)
            }
            Self::SetViewport(viewport) => device.set_viewport(viewport),
            Self::SetFramebufferSize {
                width,
                height,
                samples,
            } => device.set_framebuffer_size(width, height, samples),
            Self::SetFramebufferFormat(format) => device.set_framebuffer_format(format),
            Self::SetRenderTargetAvailable {
                kind,
                index,
                available,
            } => device.set_render_target_available(kind, index, available),
            Self::SetRenderTarget {
                kind,
                index,
                surface,
            } => device.set_render_target(kind, index, surface),
            Self::Draw {
                start_vertex,
                primitive_count,
            } => device.draw(start_vertex, primitive_count),
            Self::DrawIndex {
                start_index,
                primitive_count,
                base_vertex,
            } => device.draw_index(start_index, primitive_count, base_vertex),
            Self::ClearColor {
                index,
                region,
                color,
            } => device.clear_color(index, region, color),
            Self::ClearDepth { region, depth } => device.clear_depth(region, depth),
            Self::ClearStencil { region, stencil } => device.clear_stencil(region, stencil),
            // The caller gets the device's result; the worker sees success.
            Self::Flush(signal) => {
                signal.signal(device.flush());
                Ok(())
            }
            Self::Present(signal) => {
                signal.signal(device.present());
                Ok(())
            }
            Self::ReadFramebuffer(signal) => {
                signal.signal(device.framebuffer());
                Ok(())
            }
        }
    }
}
