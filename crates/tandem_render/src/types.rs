//! # Renderer Value and Resource Types
//!
//! Resources are immutable descriptors shared through `Arc`, so a command can
//! hold its own reference without borrowing from the caller. Plain state
//! (viewport, rasterizer, depth/stencil) is `Copy` and travels by value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Maximum simultaneously bound color targets.
pub const MAX_RENDER_TARGETS: usize = 8;

/// Number of vertex-buffer slots.
pub const MAX_VERTEX_SLOTS: usize = 16;

/// Largest texture edge accepted by resource creation.
pub const MAX_TEXTURE_DIMENSION: usize = 16_384;

/// Largest multisample count.
pub const MAX_SAMPLES: usize = 16;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique resource identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Allocates a fresh id. Lock-free, callable from any thread.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Formats and enums
// =============================================================================

/// Pixel formats for frame buffers and textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit RGBA, normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit BGRA, normalized.
    Bgra8Unorm,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// Single 32-bit float channel.
    R32Float,
}

impl PixelFormat {
    /// Bytes per texel.
    #[must_use]
    pub const fn texel_size(self) -> usize {
        match self {
            Self::Rgba8Unorm | Self::Bgra8Unorm | Self::R32Float => 4,
            Self::Rgba32Float => 16,
        }
    }
}

/// Index buffer element format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl IndexFormat {
    /// Bytes per index.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// How vertices assemble into primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent line segments.
    LineList,
    /// Connected line segments.
    LineStrip,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Connected triangles.
    TriangleStrip,
}

/// Kind of render target slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTargetKind {
    /// Color attachment, indexed `0..MAX_RENDER_TARGETS`.
    Color,
    /// The single depth/stencil attachment, index 0.
    DepthStencil,
}

/// Pipeline stage a native shader is written for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Per-vertex.
    Vertex,
    /// Per-pixel.
    Pixel,
    /// Output merger.
    Blend,
}

/// Texture dimensionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Single 2D image.
    Tex2d,
    /// Six square faces.
    Cube,
}

impl TextureKind {
    /// Number of faces (and surfaces).
    #[must_use]
    pub const fn faces(self) -> usize {
        match self {
            Self::Tex2d => 1,
            Self::Cube => 6,
        }
    }
}

// =============================================================================
// Plain values
// =============================================================================

/// RGBA color with 32-bit float channels.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Default, Pod, Zeroable)]
pub struct ColorRgba32f {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl ColorRgba32f {
    /// Creates a color.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
}

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub x: usize,
    /// Top edge.
    pub y: usize,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl Rect {
    /// Creates a rectangle.
    #[must_use]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Intersects with a `width` x `height` surface.
    #[must_use]
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    /// True if the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Viewport transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering a whole `width` x `height` frame buffer.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Skip front faces.
    Front,
    /// Skip back faces.
    #[default]
    Back,
}

/// Polygon fill mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled triangles.
    #[default]
    Solid,
    /// Edges only.
    Wireframe,
}

/// Rasterizer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct RasterizerState {
    /// Culling.
    pub cull: CullMode,
    /// Fill.
    pub fill: FillMode,
    /// Front faces are counter-clockwise.
    pub front_ccw: bool,
}

/// Depth/stencil state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// Depth test on.
    pub depth_test: bool,
    /// Depth writes on.
    pub depth_write: bool,
    /// Stencil test on.
    pub stencil_test: bool,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            stencil_test: false,
        }
    }
}

/// Texture filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    /// Nearest texel.
    Point,
    /// Bilinear.
    #[default]
    Linear,
    /// Anisotropic.
    Anisotropic,
}

/// Texture addressing outside `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Repeat.
    #[default]
    Wrap,
    /// Mirror on every repeat.
    Mirror,
    /// Clamp to edge.
    Clamp,
    /// Use the border color.
    Border,
}

/// Sampler description.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SamplerDesc {
    /// Minification/magnification filter.
    pub filter: Filter,
    /// Addressing for all coordinates.
    pub address_mode: AddressMode,
    /// Anisotropy clamp, only used by [`Filter::Anisotropic`].
    pub max_anisotropy: u32,
    /// Border color for [`AddressMode::Border`].
    pub border_color: ColorRgba32f,
}

/// Vertex attribute format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One float.
    Float1,
    /// Two floats.
    Float2,
    /// Three floats.
    Float3,
    /// Four floats.
    Float4,
}

/// One vertex attribute in an input layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputElementDesc {
    /// Semantic name, e.g. `POSITION`.
    pub semantic: String,
    /// Semantic index, e.g. `1` for `TEXCOORD1`.
    pub semantic_index: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Vertex buffer slot the attribute reads from.
    pub input_slot: usize,
    /// Byte offset inside the vertex.
    pub aligned_offset: usize,
}

impl InputElementDesc {
    /// Creates an element for slot 0.
    #[must_use]
    pub fn new(semantic: impl Into<String>, format: VertexFormat, aligned_offset: usize) -> Self {
        Self {
            semantic: semantic.into(),
            semantic_index: 0,
            format,
            input_slot: 0,
            aligned_offset,
        }
    }
}

// =============================================================================
// Shared resources
// =============================================================================

/// Linear memory buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer {
    /// Identity.
    pub id: ResourceId,
    /// Size in bytes.
    pub size: usize,
}

/// Attachable image (a texture face, or a standalone target).
#[derive(Debug, PartialEq, Eq)]
pub struct Surface {
    /// Identity.
    pub id: ResourceId,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Multisample count.
    pub samples: usize,
    /// Texel format.
    pub format: PixelFormat,
}

/// 2D or cube texture.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    /// Identity.
    pub id: ResourceId,
    /// Dimensionality.
    pub kind: TextureKind,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Multisample count.
    pub samples: usize,
    /// Texel format.
    pub format: PixelFormat,
    surfaces: Vec<Arc<Surface>>,
}

impl Texture {
    /// Creates a texture with one surface per face.
    #[must_use]
    pub fn new(
        kind: TextureKind,
        width: usize,
        height: usize,
        samples: usize,
        format: PixelFormat,
    ) -> Self {
        let surfaces = (0..kind.faces())
            .map(|_| {
                Arc::new(Surface {
                    id: ResourceId::next(),
                    width,
                    height,
                    samples,
                    format,
                })
            })
            .collect();
        Self {
            id: ResourceId::next(),
            kind,
            width,
            height,
            samples,
            format,
            surfaces,
        }
    }

    /// Surface for a face (always 0 for 2D textures).
    #[must_use]
    pub fn surface(&self, face: usize) -> Option<Arc<Surface>> {
        self.surfaces.get(face).cloned()
    }
}

/// Sampler object.
#[derive(Debug, PartialEq)]
pub struct Sampler {
    /// Identity.
    pub id: ResourceId,
    /// Description it was created from.
    pub desc: SamplerDesc,
}

/// Compiled shader code as produced by the shader compiler.
#[derive(Debug, PartialEq, Eq)]
pub struct ShaderObject {
    /// Identity.
    pub id: ResourceId,
    /// Entry point or source name.
    pub name: String,
    /// Input semantics the code consumes, e.g. `POSITION`.
    pub inputs: Vec<String>,
    /// Opaque compiled form.
    pub bytecode: Vec<u8>,
}

impl ShaderObject {
    /// Wraps compiler output.
    #[must_use]
    pub fn new(name: impl Into<String>, inputs: Vec<String>, bytecode: Vec<u8>) -> Self {
        Self {
            id: ResourceId::next(),
            name: name.into(),
            inputs,
            bytecode,
        }
    }

    /// True if the code reads the given semantic.
    #[must_use]
    pub fn consumes(&self, semantic: &str) -> bool {
        self.inputs.iter().any(|input| input.eq_ignore_ascii_case(semantic))
    }
}

/// Natively implemented shader program (vertex, pixel or blend).
#[derive(Debug, PartialEq, Eq)]
pub struct NativeShader {
    /// Identity.
    pub id: ResourceId,
    /// Stage it implements.
    pub stage: ShaderStage,
    /// Human-readable name.
    pub name: String,
}

impl NativeShader {
    /// Creates a native shader handle.
    #[must_use]
    pub fn new(stage: ShaderStage, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::next(),
            stage,
            name: name.into(),
        }
    }
}

/// Where an input layout got its signature from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutSource {
    /// Validated against compiled shader code.
    ShaderCode(ResourceId),
    /// Declared for a native vertex shader.
    NativeShader(ResourceId),
}

/// Vertex input layout.
#[derive(Debug, PartialEq, Eq)]
pub struct InputLayout {
    /// Identity.
    pub id: ResourceId,
    /// Attributes.
    pub elements: Vec<InputElementDesc>,
    /// Signature source.
    pub source: LayoutSource,
}

/// One vertex-buffer slot binding, copied out of the caller's arrays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexBufferBinding {
    /// Bound buffer.
    pub buffer: Arc<Buffer>,
    /// Bytes between vertices.
    pub stride: usize,
    /// Byte offset of the first vertex.
    pub offset: usize,
}

// =============================================================================
// Frame buffer
// =============================================================================

/// Snapshot of the frame buffer, handed out by read-back and `present`.
///
/// Color planes are stored one value per pixel per available target; the
/// multisample count is carried but not expanded.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Multisample count.
    pub samples: usize,
    /// Color format.
    pub format: PixelFormat,
    color: Vec<Option<Vec<ColorRgba32f>>>,
    depth: Vec<f32>,
    stencil: Vec<u32>,
    /// Draw calls executed since the buffer was (re)created.
    pub draw_calls: u64,
    /// Primitives submitted by those draws.
    pub primitives: u64,
    /// Frames presented so far.
    pub frame: u64,
}

impl Framebuffer {
    /// Creates a buffer with color target 0 available and everything cleared.
    #[must_use]
    pub fn new(width: usize, height: usize, samples: usize, format: PixelFormat) -> Self {
        let pixels = width * height;
        let mut color = vec![None; MAX_RENDER_TARGETS];
        color[0] = Some(vec![ColorRgba32f::BLACK; pixels]);
        Self {
            width,
            height,
            samples,
            format,
            color,
            depth: vec![1.0; pixels],
            stencil: vec![0; pixels],
            draw_calls: 0,
            primitives: 0,
            frame: 0,
        }
    }

    /// Same contents model, new dimensions. Contents are reset.
    #[must_use]
    pub fn resized(&self, width: usize, height: usize, samples: usize) -> Self {
        let mut next = Self::new(width, height, samples, self.format);
        for (index, plane) in self.color.iter().enumerate() {
            next.set_target_available(index, plane.is_some());
        }
        next.frame = self.frame;
        next
    }

    /// True if color target `index` is available.
    #[must_use]
    pub fn is_target_available(&self, index: usize) -> bool {
        self.color.get(index).is_some_and(Option::is_some)
    }

    /// Enables or disables a color target. Enabling clears it to black.
    pub fn set_target_available(&mut self, index: usize, available: bool) {
        let pixels = self.width * self.height;
        if let Some(plane) = self.color.get_mut(index) {
            match (available, plane.is_some()) {
                (true, false) => *plane = Some(vec![ColorRgba32f::BLACK; pixels]),
                (false, true) => *plane = None,
                _ => {}
            }
        }
    }

    /// Color of a pixel in target `index`.
    #[must_use]
    pub fn pixel(&self, index: usize, x: usize, y: usize) -> Option<ColorRgba32f> {
        let offset = self.offset(x, y)?;
        self.color.get(index)?.as_ref().map(|plane| plane[offset])
    }

    /// Depth of a pixel.
    #[must_use]
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.offset(x, y).map(|offset| self.depth[offset])
    }

    /// Stencil of a pixel.
    #[must_use]
    pub fn stencil_at(&self, x: usize, y: usize) -> Option<u32> {
        self.offset(x, y).map(|offset| self.stencil[offset])
    }

    /// Fills `region` (or everything) of color target `index`.
    /// Returns false if the target is not available.
    pub fn fill_color(&mut self, index: usize, region: Option<Rect>, color: ColorRgba32f) -> bool {
        let region = self.region(region);
        let width = self.width;
        match self.color.get_mut(index) {
            Some(Some(plane)) => {
                fill(plane, width, region, color);
                true
            }
            _ => false,
        }
    }

    /// Fills `region` (or everything) of the depth plane.
    pub fn fill_depth(&mut self, region: Option<Rect>, depth: f32) {
        let region = self.region(region);
        fill(&mut self.depth, self.width, region, depth);
    }

    /// Fills `region` (or everything) of the stencil plane.
    pub fn fill_stencil(&mut self, region: Option<Rect>, stencil: u32) {
        let region = self.region(region);
        fill(&mut self.stencil, self.width, region, stencil);
    }

    fn region(&self, region: Option<Rect>) -> Rect {
        region.map_or(Rect::new(0, 0, self.width, self.height), |rect| {
            rect.clamp_to(self.width, self.height)
        })
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

fn fill<T: Copy>(plane: &mut [T], stride: usize, region: Rect, value: T) {
    if region.is_empty() {
        return;
    }
    for row in region.y..region.y + region.height {
        let start = row * stride + region.x;
        plane[start..start + region.width].fill(value);
    }
}
