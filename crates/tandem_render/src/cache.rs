//! # Local State Cache
//!
//! Caller-side shadow of a few pieces of pipeline state, written at *issue*
//! time so they can be read back without a round trip to the worker.
//!
//! The cache runs ahead of the device: right after `set_vertex_shader(s)`
//! returns, the cache answers `s` even though the worker may not have bound
//! it yet. The worker never reads the cache.
//!
//! Only the keys in [`StateKey::TRACKED`] are kept. Anything else is reported
//! as [`RenderError::UntrackedState`] rather than answered with a default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{RenderError, RenderResult};
use crate::types::{Framebuffer, NativeShader, ShaderObject, Viewport};

/// Every queryable piece of renderer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Bound native vertex shader.
    VertexShader,
    /// Bound compiled vertex shader code.
    VertexShaderCode,
    /// Bound native pixel shader.
    PixelShader,
    /// Bound compiled pixel shader code.
    PixelShaderCode,
    /// Current viewport.
    Viewport,
    /// Frame buffer returned by the last read-back.
    LastFramebuffer,
    /// Bound index buffer.
    IndexBuffer,
    /// Bound index format.
    IndexFormat,
    /// Primitive topology.
    PrimitiveTopology,
    /// Rasterizer state.
    RasterizerState,
    /// Bound blend shader.
    BlendShader,
    /// Frame buffer color format.
    FramebufferFormat,
    /// Frame buffer extent.
    FramebufferSize,
    /// Render target availability.
    RenderTargetAvailable,
}

impl StateKey {
    /// Keys the cache keeps.
    pub const TRACKED: [Self; 6] = [
        Self::VertexShader,
        Self::VertexShaderCode,
        Self::PixelShader,
        Self::PixelShaderCode,
        Self::Viewport,
        Self::LastFramebuffer,
    ];

    /// True if the cache answers queries for this key.
    #[must_use]
    pub fn is_tracked(self) -> bool {
        Self::TRACKED.contains(&self)
    }

    /// Stable snake-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VertexShader => "vertex_shader",
            Self::VertexShaderCode => "vertex_shader_code",
            Self::PixelShader => "pixel_shader",
            Self::PixelShaderCode => "pixel_shader_code",
            Self::Viewport => "viewport",
            Self::LastFramebuffer => "last_framebuffer",
            Self::IndexBuffer => "index_buffer",
            Self::IndexFormat => "index_format",
            Self::PrimitiveTopology => "primitive_topology",
            Self::RasterizerState => "rasterizer_state",
            Self::BlendShader => "blend_shader",
            Self::FramebufferFormat => "framebuffer_format",
            Self::FramebufferSize => "framebuffer_size",
            Self::RenderTargetAvailable => "render_target_available",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A cached value.
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    /// A native shader program.
    Native(Arc<NativeShader>),
    /// Compiled shader code.
    Code(Arc<ShaderObject>),
    /// A viewport.
    Viewport(Viewport),
    /// A frame-buffer snapshot.
    Framebuffer(Arc<Framebuffer>),
}

/// Issue-time shadow of tracked state.
#[derive(Debug, Default)]
pub struct LocalStateCache {
    entries: Mutex<HashMap<StateKey, StateValue>>,
}

impl LocalStateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value just issued for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UntrackedState`] for keys outside
    /// [`StateKey::TRACKED`].
    pub fn record(&self, key: StateKey, value: StateValue) -> RenderResult<()> {
        if !key.is_tracked() {
            return Err(RenderError::UntrackedState(key));
        }
        self.entries.lock().insert(key, value);
        Ok(())
    }

    /// Runs `submit` and, if it succeeds, records `value` under `key`.
    ///
    /// The cache lock is held across `submit`, so when several producers
    /// issue the same key the cache ends up with whatever reached the queue
    /// last. Queries wait while a producer is stalled on a full queue.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UntrackedState`] for keys outside
    /// [`StateKey::TRACKED`], or the error from `submit`, leaving the cache
    /// unchanged.
    pub fn issue<F>(&self, key: StateKey, value: StateValue, submit: F) -> RenderResult<()>
    where
        F: FnOnce() -> RenderResult<()>,
    {
        if !key.is_tracked() {
            return Err(RenderError::UntrackedState(key));
        }
        let mut entries = self.entries.lock();
        submit()?;
        entries.insert(key, value);
        Ok(())
    }

    /// Last value issued for `key`, `None` if never set.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UntrackedState`] for keys outside
    /// [`StateKey::TRACKED`].
    pub fn get(&self, key: StateKey) -> RenderResult<Option<StateValue>> {
        if !key.is_tracked() {
            return Err(RenderError::UntrackedState(key));
        }
        Ok(self.entries.lock().get(&key).cloned())
    }

    /// Native shader stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UntrackedState`] for untracked keys.
    pub fn native(&self, key: StateKey) -> RenderResult<Option<Arc<NativeShader>>> {
        Ok(match self.get(key)? {
            Some(StateValue::Native(shader)) => Some(shader),
            _ => None,
        })
    }

    /// Shader code stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UntrackedState`] for untracked keys.
    pub fn code(&self, key: StateKey) -> RenderResult<Option<Arc<ShaderObject>>> {
        Ok(match self.get(key)? {
            Some(StateValue::Code(code)) => Some(code),
            _ => None,
        })
    }

    /// Cached viewport.
    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        match self.entries.lock().get(&StateKey::Viewport) {
            Some(StateValue::Viewport(viewport)) => Some(*viewport),
            _ => None,
        }
    }

    /// Frame buffer from the last read-back.
    #[must_use]
    pub fn last_framebuffer(&self) -> Option<Arc<Framebuffer>> {
        match self.entries.lock().get(&StateKey::LastFramebuffer) {
            Some(StateValue::Framebuffer(framebuffer)) => Some(Arc::clone(framebuffer)),
            _ => None,
        }
    }
}
