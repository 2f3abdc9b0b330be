//! # Reference Device
//!
//! Deterministic [`RenderDevice`] that keeps pipeline state, validates draws
//! and applies clears to an in-memory frame buffer. No rasterization happens:
//! a draw only bumps the frame buffer's counters.
//!
//! Every executed operation is appended to a shared [`Journal`], which is how
//! tests observe what the worker did and in which order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{PresentTarget, RenderDevice, ResourceFactory};
use crate::error::{RenderError, RenderResult};
use crate::params::{validate_extent, validate_samples, RendererParameters};
use crate::types::{
    Buffer, ColorRgba32f, DepthStencilState, Filter, Framebuffer, IndexFormat, InputElementDesc,
    InputLayout, LayoutSource, NativeShader, PixelFormat, PrimitiveTopology, RasterizerState,
    Rect, RenderTargetKind, ResourceId, Sampler, SamplerDesc, ShaderObject, ShaderStage, Surface,
    Texture, TextureKind, VertexBufferBinding, Viewport, MAX_RENDER_TARGETS, MAX_VERTEX_SLOTS,
};

/// Largest anisotropy a sampler may ask for.
pub const MAX_ANISOTROPY: u32 = 16;

// =============================================================================
// Journal
// =============================================================================

/// One executed device operation.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    /// A state change, by operation name.
    State(&'static str),
    /// A native shader bound to its stage.
    Shader {
        /// Stage it was bound to.
        stage: ShaderStage,
        /// Shader name.
        name: String,
    },
    /// A shader variable write, with the bytes the device received.
    Variable {
        /// Operation name.
        op: &'static str,
        /// Variable name.
        name: String,
        /// Received bytes.
        data: Vec<u8>,
    },
    /// Non-indexed draw.
    Draw {
        /// First vertex.
        start_vertex: usize,
        /// Primitive count.
        primitive_count: usize,
    },
    /// Indexed draw.
    DrawIndexed {
        /// First index.
        start_index: usize,
        /// Primitive count.
        primitive_count: usize,
        /// Added to every index.
        base_vertex: i32,
    },
    /// Color clear of a target.
    ClearColor(usize),
    /// Depth clear.
    ClearDepth,
    /// Stencil clear.
    ClearStencil,
    /// Flush, numbered from 1.
    Flush(u64),
    /// Present of the given frame, numbered from 1.
    Present {
        /// Frame number.
        frame: u64,
    },
    /// Frame-buffer read-back.
    ReadBack,
    /// Device dropped.
    Released,
}

/// Shared, append-only log of executed operations.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: JournalEntry) {
        self.entries.lock().push(entry);
    }

    /// Copy of all entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Draw entries only, in execution order.
    #[must_use]
    pub fn draws(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| {
                matches!(
                    entry,
                    JournalEntry::Draw { .. } | JournalEntry::DrawIndexed { .. }
                )
            })
            .cloned()
            .collect()
    }

    /// Name of the last native shader bound to `stage`.
    #[must_use]
    pub fn last_shader(&self, stage: ShaderStage) -> Option<String> {
        self.entries.lock().iter().rev().find_map(|entry| match entry {
            JournalEntry::Shader { stage: bound, name } if *bound == stage => Some(name.clone()),
            _ => None,
        })
    }

    /// Bytes of the last `op` write to variable `name`.
    #[must_use]
    pub fn last_variable(&self, op: &str, name: &str) -> Option<Vec<u8>> {
        self.entries.lock().iter().rev().find_map(|entry| match entry {
            JournalEntry::Variable {
                op: written,
                name: variable,
                data,
            } if *written == op && variable == name => Some(data.clone()),
            _ => None,
        })
    }
}

// =============================================================================
// Resources (direct path)
// =============================================================================

/// Lock-free resource factory. Safe to call concurrently with the worker.
#[derive(Debug, Default)]
pub struct ReferenceResources {
    created: AtomicU64,
}

impl ReferenceResources {
    /// Creates a factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources created so far.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    fn count<T>(&self, resource: T) -> Arc<T> {
        self.created.fetch_add(1, Ordering::Relaxed);
        Arc::new(resource)
    }
}

fn argument(error: RenderError) -> RenderError {
    match error {
        RenderError::InvalidConfig(message) => RenderError::InvalidArgument(message),
        other => other,
    }
}

fn check_elements(elements: &[InputElementDesc]) -> RenderResult<()> {
    if elements.is_empty() {
        return Err(RenderError::InvalidArgument(
            "input layout needs at least one element".to_string(),
        ));
    }
    if let Some(element) = elements.iter().find(|e| e.input_slot >= MAX_VERTEX_SLOTS) {
        return Err(RenderError::OutOfRange {
            what: "input slot",
            index: element.input_slot,
            limit: MAX_VERTEX_SLOTS,
        });
    }
    Ok(())
}

impl ResourceFactory for ReferenceResources {
    fn create_buffer(&self, size: usize) -> RenderResult<Arc<Buffer>> {
        if size == 0 {
            return Err(RenderError::InvalidArgument(
                "buffer size must be non-zero".to_string(),
            ));
        }
        Ok(self.count(Buffer {
            id: ResourceId::next(),
            size,
        }))
    }

    fn create_tex2d(
        &self,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> RenderResult<Arc<Texture>> {
        validate_extent(width, height).map_err(argument)?;
        validate_samples(samples).map_err(argument)?;
        Ok(self.count(Texture::new(TextureKind::Tex2d, width, height, samples, format)))
    }

    fn create_texcube(
        &self,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> RenderResult<Arc<Texture>> {
        validate_extent(width, height).map_err(argument)?;
        validate_samples(samples).map_err(argument)?;
        if width != height {
            return Err(RenderError::InvalidArgument(format!(
                "cube faces must be square, got {width}x{height}"
            )));
        }
        Ok(self.count(Texture::new(TextureKind::Cube, width, height, samples, format)))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> RenderResult<Arc<Sampler>> {
        if desc.filter == Filter::Anisotropic
            && !(1..=MAX_ANISOTROPY).contains(&desc.max_anisotropy)
        {
            return Err(RenderError::InvalidArgument(format!(
                "max_anisotropy {} outside 1..={MAX_ANISOTROPY}",
                desc.max_anisotropy
            )));
        }
        Ok(self.count(Sampler {
            id: ResourceId::next(),
            desc: *desc,
        }))
    }

    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<ShaderObject>,
    ) -> RenderResult<Arc<InputLayout>> {
        check_elements(elements)?;
        if let Some(element) = elements.iter().find(|e| !shader.consumes(&e.semantic)) {
            return Err(RenderError::InvalidArgument(format!(
                "shader '{}' does not consume semantic {}",
                shader.name, element.semantic
            )));
        }
        Ok(self.count(InputLayout {
            id: ResourceId::next(),
            elements: elements.to_vec(),
            source: LayoutSource::ShaderCode(shader.id),
        }))
    }

    fn create_input_layout_native(
        &self,
        elements: &[InputElementDesc],
        shader: &Arc<NativeShader>,
    ) -> RenderResult<Arc<InputLayout>> {
        check_elements(elements)?;
        if shader.stage != ShaderStage::Vertex {
            return Err(RenderError::InvalidArgument(format!(
                "'{}' is a {:?} shader, not a vertex shader",
                shader.name, shader.stage
            )));
        }
        Ok(self.count(InputLayout {
            id: ResourceId::next(),
            elements: elements.to_vec(),
            source: LayoutSource::NativeShader(shader.id),
        }))
    }
}

// =============================================================================
// Device (queued path)
// =============================================================================

/// Deterministic reference device.
pub struct ReferenceRenderer {
    presenter: Arc<dyn PresentTarget>,
    resources: Arc<ReferenceResources>,
    journal: Journal,
    framebuffer: Arc<Framebuffer>,

    input_layout: Option<Arc<InputLayout>>,
    vertex_buffers: Vec<Option<VertexBufferBinding>>,
    index_buffer: Option<(Arc<Buffer>, IndexFormat)>,
    topology: PrimitiveTopology,

    vertex_shader: Option<Arc<NativeShader>>,
    vertex_shader_code: Option<Arc<ShaderObject>>,
    pixel_shader: Option<Arc<NativeShader>>,
    pixel_shader_code: Option<Arc<ShaderObject>>,
    blend_shader: Option<Arc<NativeShader>>,
    vs_variables: HashMap<String, Vec<u8>>,
    vs_pointers: HashMap<String, Vec<u8>>,
    ps_variables: HashMap<String, Vec<u8>>,
    vs_samplers: HashMap<String, Arc<Sampler>>,
    ps_samplers: HashMap<String, Arc<Sampler>>,

    rasterizer: RasterizerState,
    depth_stencil: DepthStencilState,
    stencil_ref: i32,
    viewport: Viewport,

    color_targets: Vec<Option<Arc<Surface>>>,
    depth_target: Option<Arc<Surface>>,
    flushes: u64,
}

impl ReferenceRenderer {
    /// Builds a device that logs into `journal`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] for invalid parameters.
    pub fn with_journal(
        params: &RendererParameters,
        presenter: Arc<dyn PresentTarget>,
        journal: Journal,
    ) -> RenderResult<Self> {
        params.validate()?;
        Ok(Self {
            presenter,
            resources: Arc::new(ReferenceResources::new()),
            journal,
            framebuffer: Arc::new(Framebuffer::new(
                params.width,
                params.height,
                params.samples,
                params.format,
            )),
            input_layout: None,
            vertex_buffers: vec![None; MAX_VERTEX_SLOTS],
            index_buffer: None,
            topology: PrimitiveTopology::default(),
            vertex_shader: None,
            vertex_shader_code: None,
            pixel_shader: None,
            pixel_shader_code: None,
            blend_shader: None,
            vs_variables: HashMap::new(),
            vs_pointers: HashMap::new(),
            ps_variables: HashMap::new(),
            vs_samplers: HashMap::new(),
            ps_samplers: HashMap::new(),
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            stencil_ref: 0,
            viewport: Viewport::full(params.width, params.height),
            color_targets: vec![None; MAX_RENDER_TARGETS],
            depth_target: None,
            flushes: 0,
        })
    }

    /// The journal this device writes to.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn state(&self, name: &'static str) -> RenderResult<()> {
        tracing::trace!(op = name, "state change");
        self.journal.record(JournalEntry::State(name));
        Ok(())
    }

    fn bind_shader(&self, shader: &NativeShader) -> RenderResult<()> {
        tracing::trace!(stage = ?shader.stage, name = %shader.name, "shader bound");
        self.journal.record(JournalEntry::Shader {
            stage: shader.stage,
            name: shader.name.clone(),
        });
        Ok(())
    }

    fn write_variable(&self, op: &'static str, name: &str, data: &[u8]) -> RenderResult<()> {
        tracing::trace!(op, name, bytes = data.len(), "variable written");
        self.journal.record(JournalEntry::Variable {
            op,
            name: name.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn check_stage(shader: &NativeShader, expected: ShaderStage) -> RenderResult<()> {
        if shader.stage != expected {
            return Err(RenderError::InvalidArgument(format!(
                "'{}' is a {:?} shader, expected {expected:?}",
                shader.name, shader.stage
            )));
        }
        Ok(())
    }

    fn check_variable(name: &str) -> RenderResult<()> {
        if name.is_empty() {
            return Err(RenderError::InvalidArgument(
                "shader variable name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Pipeline state a draw needs.
    fn check_pipeline(&self) -> RenderResult<()> {
        if self.vertex_shader.is_none() && self.vertex_shader_code.is_none() {
            return Err(RenderError::MissingState("vertex shader"));
        }
        if self.pixel_shader.is_none() && self.pixel_shader_code.is_none() {
            return Err(RenderError::MissingState("pixel shader"));
        }
        let layout = self
            .input_layout
            .as_ref()
            .ok_or(RenderError::MissingState("input layout"))?;
        let unbound = layout
            .elements
            .iter()
            .any(|element| !matches!(self.vertex_buffers.get(element.input_slot), Some(Some(_))));
        if unbound {
            return Err(RenderError::MissingState("vertex buffer"));
        }
        Ok(())
    }

    fn count_draw(&mut self, primitive_count: usize) {
        let framebuffer = Arc::make_mut(&mut self.framebuffer);
        framebuffer.draw_calls += 1;
        framebuffer.primitives += primitive_count as u64;
    }

    fn check_surface(&self, surface: &Surface) -> RenderResult<()> {
        if surface.width != self.framebuffer.width || surface.height != self.framebuffer.height {
            return Err(RenderError::InvalidArgument(format!(
                "surface {}x{} does not match frame buffer {}x{}",
                surface.width, surface.height, self.framebuffer.width, self.framebuffer.height
            )));
        }
        Ok(())
    }
}

impl RenderDevice for ReferenceRenderer {
    fn create(params: &RendererParameters, presenter: Arc<dyn PresentTarget>) -> RenderResult<Self> {
        Self::with_journal(params, presenter, Journal::new())
    }

    fn resources(&self) -> Arc<dyn ResourceFactory> {
        Arc::clone(&self.resources) as Arc<dyn ResourceFactory>
    }

    fn set_input_layout(&mut self, layout: Arc<InputLayout>) -> RenderResult<()> {
        self.input_layout = Some(layout);
        self.state("set_input_layout")
    }

    fn set_vertex_buffers(
        &mut self,
        start_slot: usize,
        bindings: Vec<VertexBufferBinding>,
    ) -> RenderResult<()> {
        let end = match start_slot.checked_add(bindings.len()) {
            Some(end) if end <= MAX_VERTEX_SLOTS => end,
            _ => {
                return Err(RenderError::OutOfRange {
                    what: "vertex buffer slot",
                    index: start_slot,
                    limit: MAX_VERTEX_SLOTS,
                })
            }
        };
        for (slot, binding) in self.vertex_buffers[start_slot..end]
            .iter_mut()
            .zip(bindings)
        {
            *slot = Some(binding);
        }
        self.state("set_vertex_buffers")
    }

    fn set_index_buffer(&mut self, buffer: Arc<Buffer>, format: IndexFormat) -> RenderResult<()> {
        if buffer.size % format.size() != 0 {
            return Err(RenderError::InvalidArgument(format!(
                "index buffer of {} bytes is not a whole number of {format:?} indices",
                buffer.size
            )));
        }
        self.index_buffer = Some((buffer, format));
        self.state("set_index_buffer")
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> RenderResult<()> {
        self.topology = topology;
        self.state("set_primitive_topology")
    }

    fn set_vertex_shader(&mut self, shader: Arc<NativeShader>) -> RenderResult<()> {
        Self::check_stage(&shader, ShaderStage::Vertex)?;
        self.bind_shader(&shader)?;
        self.vertex_shader = Some(shader);
        self.state("set_vertex_shader")
    }

    fn set_vertex_shader_code(&mut self, code: Arc<ShaderObject>) -> RenderResult<()> {
        self.vertex_shader_code = Some(code);
        self.state("set_vertex_shader_code")
    }

    fn set_vs_variable_value(&mut self, name: &str, data: &[u8]) -> RenderResult<()> {
        Self::check_variable(name)?;
        self.vs_variables.insert(name.to_string(), data.to_vec());
        self.write_variable("set_vs_variable_value", name, data)
    }

    fn set_vs_variable_pointer(&mut self, name: &str, data: &[u8]) -> RenderResult<()> {
        Self::check_variable(name)?;
        self.vs_pointers.insert(name.to_string(), data.to_vec());
        self.write_variable("set_vs_variable_pointer", name, data)
    }

    fn set_vs_sampler(&mut self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()> {
        Self::check_variable(name)?;
        self.vs_samplers.insert(name.to_string(), sampler);
        self.state("set_vs_sampler")
    }

    fn set_pixel_shader(&mut self, shader: Arc<NativeShader>) -> RenderResult<()> {
        Self::check_stage(&shader, ShaderStage::Pixel)?;
        self.bind_shader(&shader)?;
        self.pixel_shader = Some(shader);
        self.state("set_pixel_shader")
    }

    fn set_pixel_shader_code(&mut self, code: Arc<ShaderObject>) -> RenderResult<()> {
        self.pixel_shader_code = Some(code);
        self.state("set_pixel_shader_code")
    }

    fn set_ps_variable(&mut self, name: &str, data: &[u8]) -> RenderResult<()> {
        Self::check_variable(name)?;
        self.ps_variables.insert(name.to_string(), data.to_vec());
        self.write_variable("set_ps_variable", name, data)
    }

    fn set_ps_sampler(&mut self, name: &str, sampler: Arc<Sampler>) -> RenderResult<()> {
        Self::check_variable(name)?;
        self.ps_samplers.insert(name.to_string(), sampler);
        self.state("set_ps_sampler")
    }

    fn set_blend_shader(&mut self, shader: Arc<NativeShader>) -> RenderResult<()> {
        Self::check_stage(&shader, ShaderStage::Blend)?;
        self.blend_shader = Some(shader);
        self.state("set_blend_shader")
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) -> RenderResult<()> {
        self.rasterizer = state;
        self.state("set_rasterizer_state")
    }

    fn set_depth_stencil_state(
        &mut self,
        state: DepthStencilState,
        stencil_ref: i32,
    ) -> RenderResult<()> {
        self.depth_stencil = state;
        self.stencil_ref = stencil_ref;
        self.state("set_depth_stencil_state")
    }

    fn set_viewport(&mut self, viewport: Viewport) -> RenderResult<()> {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Err(RenderError::InvalidArgument(format!(
                "viewport {}x{} must have a positive extent",
                viewport.width, viewport.height
            )));
        }
        self.viewport = viewport;
        self.state("set_viewport")
    }

    fn set_framebuffer_size(
        &mut self,
        width: usize,
        height: usize,
        samples: usize,
    ) -> RenderResult<()> {
        validate_extent(width, height).map_err(argument)?;
        validate_samples(samples).map_err(argument)?;
        self.framebuffer = Arc::new(self.framebuffer.resized(width, height, samples));
        self.state("set_framebuffer_size")
    }

    fn set_framebuffer_format(&mut self, format: PixelFormat) -> RenderResult<()> {
        Arc::make_mut(&mut self.framebuffer).format = format;
        self.state("set_framebuffer_format")
    }

    fn set_render_target_available(
        &mut self,
        kind: RenderTargetKind,
        index: usize,
        available: bool,
    ) -> RenderResult<()> {
        if kind == RenderTargetKind::Color {
            if index >= MAX_RENDER_TARGETS {
                return Err(RenderError::OutOfRange {
                    what: "color target",
                    index,
                    limit: MAX_RENDER_TARGETS,
                });
            }
            Arc::make_mut(&mut self.framebuffer).set_target_available(index, available);
        }
        self.state("set_render_target_available")
    }

    fn set_render_target(
        &mut self,
        kind: RenderTargetKind,
        index: usize,
        surface: Option<Arc<Surface>>,
    ) -> RenderResult<()> {
        if let Some(surface) = &surface {
            self.check_surface(surface)?;
        }
        match kind {
            RenderTargetKind::Color => {
                let slot = self.color_targets.get_mut(index).ok_or(RenderError::OutOfRange {
                    what: "color target",
                    index,
                    limit: MAX_RENDER_TARGETS,
                })?;
                *slot = surface;
            }
            RenderTargetKind::DepthStencil => self.depth_target = surface,
        }
        self.state("set_render_target")
    }

    fn draw(&mut self, start_vertex: usize, primitive_count: usize) -> RenderResult<()> {
        self.check_pipeline()?;
        self.count_draw(primitive_count);
        self.journal.record(JournalEntry::Draw {
            start_vertex,
            primitive_count,
        });
        Ok(())
    }

    fn draw_index(
        &mut self,
        start_index: usize,
        primitive_count: usize,
        base_vertex: i32,
    ) -> RenderResult<()> {
        self.check_pipeline()?;
        if self.index_buffer.is_none() {
            return Err(RenderError::MissingState("index buffer"));
        }
        self.count_draw(primitive_count);
        self.journal.record(JournalEntry::DrawIndexed {
            start_index,
            primitive_count,
            base_vertex,
        });
        Ok(())
    }

    fn clear_color(
        &mut self,
        index: usize,
        region: Option<Rect>,
        color: ColorRgba32f,
    ) -> RenderResult<()> {
        if !Arc::make_mut(&mut self.framebuffer).fill_color(index, region, color) {
            return Err(RenderError::MissingState("color target"));
        }
        self.journal.record(JournalEntry::ClearColor(index));
        Ok(())
    }

    fn clear_depth(&mut self, region: Option<Rect>, depth: f32) -> RenderResult<()> {
        if !(0.0..=1.0).contains(&depth) {
            return Err(RenderError::InvalidArgument(format!(
                "depth {depth} outside [0, 1]"
            )));
        }
        Arc::make_mut(&mut self.framebuffer).fill_depth(region, depth);
        self.journal.record(JournalEntry::ClearDepth);
        Ok(())
    }

    fn clear_stencil(&mut self, region: Option<Rect>, stencil: u32) -> RenderResult<()> {
        Arc::make_mut(&mut self.framebuffer).fill_stencil(region, stencil);
        self.journal.record(JournalEntry::ClearStencil);
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        self.flushes += 1;
        self.journal.record(JournalEntry::Flush(self.flushes));
        Ok(())
    }

    fn present(&mut self) -> RenderResult<()> {
        let frame = {
            let framebuffer = Arc::make_mut(&mut self.framebuffer);
            framebuffer.frame += 1;
            framebuffer.frame
        };
        self.presenter.present(Arc::clone(&self.framebuffer))?;
        tracing::debug!(frame, "frame presented");
        self.journal.record(JournalEntry::Present { frame });
        Ok(())
    }

    fn framebuffer(&self) -> Arc<Framebuffer> {
        self.journal.record(JournalEntry::ReadBack);
        Arc::clone(&self.framebuffer)
    }
}

impl Drop for ReferenceRenderer {
    fn drop(&mut self) {
        tracing::debug!(flushes = self.flushes, "reference device released");
        self.journal.record(JournalEntry::Released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessPresenter;
    use crate::types::VertexFormat;

    fn device() -> ReferenceRenderer {
        ReferenceRenderer::create(
            &RendererParameters::new(4, 4),
            Arc::new(HeadlessPresenter::new()),
        )
        .unwrap()
    }

    fn bind_pipeline(device: &mut ReferenceRenderer) {
        let resources = device.resources();
        let vs = Arc::new(NativeShader::new(ShaderStage::Vertex, "vs"));
        let ps = Arc::new(NativeShader::new(ShaderStage::Pixel, "ps"));
        let layout = resources
            .create_input_layout_native(
                &[InputElementDesc::new("POSITION", VertexFormat::Float3, 0)],
                &vs,
            )
            .unwrap();
        let buffer = resources.create_buffer(36).unwrap();
        device.set_vertex_shader(vs).unwrap();
        device.set_pixel_shader(ps).unwrap();
        device.set_input_layout(layout).unwrap();
        device
            .set_vertex_buffers(
                0,
                vec![VertexBufferBinding {
                    buffer,
                    stride: 12,
                    offset: 0,
                }],
            )
            .unwrap();
    }

    #[test]
    fn test_vertex_slot_overflow_is_out_of_range() {
        let mut device = device();
        let buffer = device.resources().create_buffer(12).unwrap();
        let result = device.set_vertex_buffers(
            usize::MAX,
            vec![VertexBufferBinding {
                buffer,
                stride: 12,
                offset: 0,
            }],
        );
        assert!(matches!(
            result,
            Err(RenderError::OutOfRange {
                index: usize::MAX,
                limit: MAX_VERTEX_SLOTS,
                ..
            })
        ));
        assert!(device.journal().is_empty());
    }

    #[test]
    fn test_journal_keeps_bound_shaders_and_variable_bytes() {
        let mut device = device();
        bind_pipeline(&mut device);
        device
            .set_vertex_shader(Arc::new(NativeShader::new(ShaderStage::Vertex, "vs2")))
            .unwrap();
        device.set_ps_variable("tint", &[1, 2, 3, 4]).unwrap();
        device.set_ps_variable("tint", &[5, 6]).unwrap();

        let journal = device.journal();
        assert_eq!(journal.last_shader(ShaderStage::Vertex).as_deref(), Some("vs2"));
        assert_eq!(journal.last_shader(ShaderStage::Pixel).as_deref(), Some("ps"));
        assert_eq!(journal.last_shader(ShaderStage::Blend), None);
        assert_eq!(journal.last_variable("set_ps_variable", "tint"), Some(vec![5, 6]));
        assert_eq!(journal.last_variable("set_vs_variable_value", "tint"), None);
    }

    #[test]
    fn test_draw_without_shaders_is_missing_state() {
        let mut device = device();
        assert_eq!(
            device.draw(0, 1),
            Err(RenderError::MissingState("vertex shader"))
        );
        assert!(device.journal().draws().is_empty());
    }

    #[test]
    fn test_draw_counts_primitives() {
        let mut device = device();
        bind_pipeline(&mut device);
        device.draw(0, 2).unwrap();
        device.draw(3, 5).unwrap();
        let framebuffer = device.framebuffer();
        assert_eq!(framebuffer.draw_calls, 2);
        assert_eq!(framebuffer.primitives, 7);
    }

    #[test]
    fn test_indexed_draw_needs_index_buffer() {
        let mut device = device();
        bind_pipeline(&mut device);
        assert_eq!(
            device.draw_index(0, 1, 0),
            Err(RenderError::MissingState("index buffer"))
        );
        let indices = device.resources().create_buffer(12).unwrap();
        device.set_index_buffer(indices, IndexFormat::Uint16).unwrap();
        device.draw_index(0, 2, -1).unwrap();
    }

    #[test]
    fn test_wrong_shader_stage_rejected() {
        let mut device = device();
        let ps = Arc::new(NativeShader::new(ShaderStage::Pixel, "ps"));
        assert!(matches!(
            device.set_vertex_shader(ps),
            Err(RenderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_clears() {
        let mut device = device();
        let before = device.framebuffer();
        let red = ColorRgba32f::new(1.0, 0.0, 0.0, 1.0);
        device.clear_color(0, None, red).unwrap();
        assert_eq!(before.pixel(0, 0, 0), Some(ColorRgba32f::BLACK));
        assert_eq!(device.framebuffer().pixel(0, 0, 0), Some(red));
    }

    #[test]
    fn test_clear_unavailable_target_fails() {
        let mut device = device();
        assert_eq!(
            device.clear_color(2, None, ColorRgba32f::BLACK),
            Err(RenderError::MissingState("color target"))
        );
        device
            .set_render_target_available(RenderTargetKind::Color, 2, true)
            .unwrap();
        device.clear_color(2, None, ColorRgba32f::BLACK).unwrap();
    }

    #[test]
    fn test_present_hands_frame_to_presenter() {
        let presenter = Arc::new(HeadlessPresenter::new());
        let mut device = ReferenceRenderer::create(
            &RendererParameters::new(2, 2),
            Arc::clone(&presenter) as Arc<dyn PresentTarget>,
        )
        .unwrap();
        device.present().unwrap();
        device.present().unwrap();
        assert_eq!(presenter.frames(), 2);
        assert_eq!(presenter.last_frame().map(|f| f.frame), Some(2));
    }

    #[test]
    fn test_resource_validation() {
        let resources = ReferenceResources::new();
        assert!(resources.create_buffer(0).is_err());
        assert!(resources
            .create_texcube(16, 8, 1, PixelFormat::Rgba8Unorm)
            .is_err());
        let cube = resources
            .create_texcube(16, 16, 1, PixelFormat::Rgba8Unorm)
            .unwrap();
        assert_eq!(cube.kind, TextureKind::Cube);

        let code = Arc::new(ShaderObject::new("vs_main", vec!["POSITION".to_string()], vec![]));
        let normal = InputElementDesc::new("NORMAL", VertexFormat::Float3, 12);
        assert!(resources.create_input_layout(&[normal], &code).is_err());
        assert_eq!(resources.created(), 1);
    }

    #[test]
    fn test_drop_records_release() {
        let journal = Journal::new();
        let device = ReferenceRenderer::with_journal(
            &RendererParameters::new(2, 2),
            Arc::new(HeadlessPresenter::new()),
            journal.clone(),
        )
        .unwrap();
        drop(device);
        assert_eq!(journal.entries(), vec![JournalEntry::Released]);
    }
}
