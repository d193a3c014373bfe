//! # liquid-rs-cli
//!
//! The `liquid-rs` command-line tool.
//!
//! - `render <template>` renders a template file against JSON data
//! - `check <template>...` parses templates and reports syntax errors
//!
//! ```rust
//! use liquid_rs_cli::command::CommandRegistry;
//! use liquid_rs_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//! assert_eq!(registry.list_commands(), vec!["check", "render"]);
//! ```

pub mod command;
pub mod commands;

pub use command::{Command, CommandRegistry};
