//! Settings for the liquid-rs engine.
//!
//! [`Settings`] holds everything an embedder can configure without writing
//! code: where templates live, whether parsed documents are cached, and how
//! verbose logging is. All sections have defaults so partial configuration
//! files work.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Template source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Directories searched in order for template files.
    pub dirs: Vec<PathBuf>,
    /// Extension appended to names that have none (e.g. `"liquid"`).
    pub extension: Option<String>,
}

/// Parsed-document cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Whether parsed documents are cached by content hash.
    pub enabled: bool,
    /// Upper bound on cached documents. `None` means unbounded.
    pub max_entries: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: None,
        }
    }
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use liquid_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(!settings.debug);
/// assert!(settings.cache.enabled);
/// assert_eq!(settings.log_level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled. Switches logging to a pretty format.
    pub debug: bool,
    /// The tracing filter directive (e.g. `"info"`, `"liquid_rs_template=debug"`).
    pub log_level: String,

    // ── Templates ────────────────────────────────────────────────────

    /// Template source configuration.
    pub templates: TemplateSettings,

    // ── Cache ────────────────────────────────────────────────────────

    /// Parsed-document cache configuration.
    pub cache: CacheSettings,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            templates: TemplateSettings::default(),
            cache: CacheSettings::default(),
            extra: HashMap::new(),
        }
    }
}
