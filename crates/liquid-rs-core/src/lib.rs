//! # liquid-rs-core
//!
//! Foundation types shared by every liquid-rs crate. Nothing in here knows
//! about templates; it only carries the error taxonomy, configuration and
//! logging setup.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Engine settings with defaults
//! - [`settings_loader`] - Loading settings from TOML, JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{LiquidError, LiquidResult};
pub use settings::Settings;
