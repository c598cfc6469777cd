//! Error taxonomy for the rendering core.
//!
//! Application plumbing (CLI, frame sources, export) keeps using
//! `anyhow::Result`; these typed errors are what the core surfaces so that
//! callers can tell an expected cancellation apart from a misconfigured
//! session.

/// Failures of a single render pass.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The source frame is too small to give every cell a non-empty block.
    #[error(
        "degenerate sampling: {grid_width}x{grid_height} grid cannot sample a {frame_width}x{frame_height} frame"
    )]
    DegenerateSampling {
        grid_width: usize,
        grid_height: usize,
        frame_width: usize,
        frame_height: usize,
    },

    /// The pass observed its cancellation token before finishing the grid.
    #[error("render pass cancelled")]
    Cancelled,
}

impl RenderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Problems building a [`crate::pixel_buffer::PixelBuffer`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame {width}x{height} expects {expected} bytes of rgb24, got {actual}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("frame dimensions {width}x{height} overflow")]
    Overflow { width: usize, height: usize },
}

/// Errors raised by session-level operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown shader '{0}'")]
    UnknownShaderName(String),

    #[error("session is suspended")]
    Suspended,
}

/// Invalid configuration values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid columns and rows must be > 0 (got {columns}x{rows})")]
    EmptyGrid { columns: usize, rows: usize },

    #[error("fps must be > 0")]
    ZeroFps,

    #[error("export cell size must be > 0 (got {width}x{height})")]
    EmptyExportCell { width: u32, height: u32 },

    #[error("unknown shader '{name}' (available: {available})")]
    UnknownShader { name: String, available: String },
}
