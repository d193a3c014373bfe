//! Error types for liquid-rs.
//!
//! [`LiquidError`] separates the three fatal classes a caller cares about:
//! a bad template (parse errors), bad data (render errors), and a missing
//! collaborator (no loader configured). Soft failures such as unresolved
//! variables or unknown filters never surface here.

use thiserror::Error;

/// The primary error type for liquid-rs.
///
/// Parsing and rendering both return this type. Use [`is_parse_error`] and
/// [`is_render_error`] to tell the classes apart without matching every
/// variant.
///
/// [`is_parse_error`]: LiquidError::is_parse_error
/// [`is_render_error`]: LiquidError::is_render_error
#[derive(Error, Debug)]
pub enum LiquidError {
    // ── Parsing ──────────────────────────────────────────────────────

    /// The template contains malformed markup, an unknown tag, an unexpected
    /// terminator, or a block that was never closed.
    #[error("Liquid syntax error: {0}")]
    SyntaxError(String),

    // ── Rendering ────────────────────────────────────────────────────

    /// The data could not be rendered (incomparable operands, a filter given
    /// a value it cannot process).
    #[error("Liquid render error: {0}")]
    RenderError(String),

    /// The tick callback asked the render loop to stop.
    #[error("Rendering aborted by tick callback")]
    RenderAborted,

    // ── Dependencies ─────────────────────────────────────────────────

    /// A composition tag needed a source loader and none was configured.
    #[error("Missing file system: {0}")]
    MissingFilesystem(String),

    /// The loader could not find the requested template.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LiquidError {
    /// Returns `true` for errors that mean the template itself is invalid.
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::SyntaxError(_))
    }

    /// Returns `true` for errors raised while rendering valid templates.
    pub const fn is_render_error(&self) -> bool {
        matches!(self, Self::RenderError(_) | Self::RenderAborted)
    }

    /// Shorthand for building a [`LiquidError::SyntaxError`].
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::SyntaxError(message.into())
    }

    /// Shorthand for building a [`LiquidError::RenderError`].
    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderError(message.into())
    }
}

/// A convenience type alias for `Result<T, LiquidError>`.
pub type LiquidResult<T> = Result<T, LiquidError>;
