//! # Renderer Parameters
//!
//! Frame-buffer setup plus the dispatch table, loadable from TOML:
//!
//! ```toml
//! width = 1280
//! height = 720
//! samples = 4
//! format = "rgba8_unorm"
//!
//! [dispatch]
//! queue_capacity = 64
//! worker_name = "render-worker"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tandem_core::DispatchConfig;

use crate::error::{RenderError, RenderResult};
use crate::types::{PixelFormat, MAX_SAMPLES, MAX_TEXTURE_DIMENSION};

/// Construction parameters for a renderer and its device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererParameters {
    /// Back-buffer width in pixels.
    pub width: usize,
    /// Back-buffer height in pixels.
    pub height: usize,
    /// Multisample count.
    pub samples: usize,
    /// Back-buffer color format.
    pub format: PixelFormat,
    /// Queue and worker settings.
    pub dispatch: DispatchConfig,
}

impl Default for RendererParameters {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            samples: 1,
            format: PixelFormat::default(),
            dispatch: DispatchConfig::default().with_worker_name("render-worker"),
        }
    }
}

impl RendererParameters {
    /// Parameters for a `width` x `height` single-sampled back buffer.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Parses and validates parameters from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] if the text does not parse or a
    /// value is out of range.
    pub fn from_toml_str(text: &str) -> RenderResult<Self> {
        let params: Self = toml::from_str(text)
            .map_err(|e| RenderError::InvalidConfig(format!("Failed to parse parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    /// Reads, parses and validates a TOML parameters file.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] if the file cannot be read or
    /// its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RenderError::InvalidConfig(format!("Failed to read {}: {e}", path.display()))
        })?;
        let params = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "renderer parameters loaded");
        Ok(params)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] for zero or oversized
    /// dimensions, a bad sample count, or a bad dispatch table.
    pub fn validate(&self) -> RenderResult<()> {
        validate_extent(self.width, self.height)?;
        validate_samples(self.samples)?;
        self.dispatch
            .validate()
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))
    }

    /// Sets the multisample count.
    #[must_use]
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Sets the back-buffer format.
    #[must_use]
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the dispatch table.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}

pub(crate) fn validate_extent(width: usize, height: usize) -> RenderResult<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidConfig(format!(
            "extent {width}x{height} must be non-zero"
        )));
    }
    if width > MAX_TEXTURE_DIMENSION || height > MAX_TEXTURE_DIMENSION {
        return Err(RenderError::InvalidConfig(format!(
            "extent {width}x{height} exceeds {MAX_TEXTURE_DIMENSION}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_samples(samples: usize) -> RenderResult<()> {
    if samples == 0 || samples > MAX_SAMPLES || !samples.is_power_of_two() {
        return Err(RenderError::InvalidConfig(format!(
            "sample count {samples} must be a power of two in 1..={MAX_SAMPLES}"
        )));
    }
    Ok(())
}
