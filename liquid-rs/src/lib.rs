//! # liquid-rs
//!
//! Liquid templates for Rust.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `liquid-rs` to get everything, or on individual crates for finer-grained
//! control.
//!
//! ```
//! # #[cfg(feature = "template")]
//! # {
//! use liquid_rs::prelude::*;
//!
//! let loader = StringLoader::new();
//! loader.add("base", "<h1>{% block title %}Untitled{% endblock %}</h1>");
//! let engine = Engine::new().with_loader(loader);
//!
//! let page = engine
//!     .parse("{% extends 'base' %}{% block title %}{{ name | capitalize }}{% endblock %}")
//!     .unwrap();
//! let out = page.render([("name".to_string(), Value::from("home"))].into()).unwrap();
//! assert_eq!(out, "<h1>Home</h1>");
//! # }
//! ```

/// Error types, settings, and logging setup.
pub use liquid_rs_core as core;

/// The template engine.
#[cfg(feature = "template")]
pub use liquid_rs_template as template;

/// The `liquid-rs` command-line tool.
#[cfg(feature = "cli")]
pub use liquid_rs_cli as cli;

pub use liquid_rs_core::{LiquidError, LiquidResult, Settings};

/// Re-exported for building assigns from JSON.
pub use serde_json;
pub use tracing;

/// The types most programs need.
pub mod prelude {
    pub use liquid_rs_core::{LiquidError, LiquidResult, Settings};

    #[cfg(feature = "template")]
    pub use liquid_rs_template::{
        Assigns, Context, DocumentCache, Engine, FileSystemLoader, FilterRegistry, MemoryCache,
        SourceLoader, StringLoader, Template, TickControl, Value,
    };
}
