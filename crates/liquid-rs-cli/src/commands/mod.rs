//! Built-in subcommands.

pub mod check;
pub mod render;

use std::path::{Path, PathBuf};

pub use check::CheckCommand;
pub use render::RenderCommand;

use liquid_rs_core::Settings;

use crate::command::CommandRegistry;

/// Registers every built-in subcommand.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(RenderCommand));
    registry.register(Box::new(CheckCommand));
}

/// Splits a template path into a search directory and a template name.
///
/// The name is looked up relative to the configured template directories
/// when any are set; otherwise the file's own directory becomes the only
/// search directory, so its includes resolve next to it.
pub(crate) fn locate(settings: &mut Settings, template: &Path) -> (String, Option<PathBuf>) {
    if !settings.templates.dirs.is_empty() && template.is_relative() {
        return (template.to_string_lossy().into_owned(), None);
    }
    let dir = template
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let name = template
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    settings.templates.dirs.push(dir.clone());
    (name, Some(dir))
}
