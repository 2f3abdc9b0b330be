//! # TANDEM Render
//!
//! Asynchronous renderer proxy built on [`tandem_core`].
//!
//! ## Design Principles
//!
//! 1. **Caller never waits by accident** - state changes, draws and clears are
//!    queued and return immediately
//! 2. **Explicit synchronization** - `flush`, `present` and `framebuffer` block
//!    until everything issued before them has executed
//! 3. **Direct resources** - `create_*` calls bypass the queue entirely
//! 4. **Honest queries** - a cached answer or an `UntrackedState` error, never
//!    a made-up default
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tandem_render::{
//!     AsyncRenderer, ColorRgba32f, HeadlessPresenter, ReferenceRenderer, Renderer,
//!     RendererParameters,
//! };
//!
//! let params = RendererParameters::load("renderer.toml")?;
//! let renderer = AsyncRenderer::<ReferenceRenderer>::run(params, Arc::new(HeadlessPresenter::new()))?;
//!
//! renderer.clear_color(0, ColorRgba32f::BLACK)?;
//! renderer.draw(0, 2)?;
//! renderer.present()?;
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod async_renderer;
pub mod cache;
pub mod command;
pub mod device;
pub mod error;
pub mod params;
pub mod reference;
pub mod renderer;
pub mod types;

pub use async_renderer::AsyncRenderer;
pub use cache::{LocalStateCache, StateKey, StateValue};
pub use command::RenderCommand;
pub use device::{HeadlessPresenter, PresentTarget, RenderDevice, ResourceFactory};
pub use error::{RenderError, RenderResult};
pub use params::RendererParameters;
pub use reference::{Journal, JournalEntry, ReferenceRenderer, ReferenceResources};
pub use renderer::Renderer;
pub use types::{
    AddressMode, Buffer, ColorRgba32f, CullMode, DepthStencilState, FillMode, Filter, Framebuffer,
    IndexFormat, InputElementDesc, InputLayout, LayoutSource, NativeShader, PixelFormat,
    PrimitiveTopology, RasterizerState, Rect, RenderTargetKind, ResourceId, Sampler, SamplerDesc,
    ShaderObject, ShaderStage, Surface, Texture, TextureKind, VertexBufferBinding, VertexFormat,
    Viewport,
};
