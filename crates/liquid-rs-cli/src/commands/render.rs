//! The `render` command.
//!
//! Renders one template file against optional JSON data and prints the
//! result.

use std::path::{Path, PathBuf};

use liquid_rs_core::{LiquidError, LiquidResult, Settings};
use liquid_rs_template::context::{assigns_from_json, Assigns};
use liquid_rs_template::Engine;

use super::locate;
use crate::command::Command;

pub struct RenderCommand;

/// Reads a JSON object of render variables.
pub fn load_data(path: &Path) -> LiquidResult<Assigns> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        LiquidError::ConfigurationError(format!("Invalid JSON in {}: {e}", path.display()))
    })?;
    if !value.is_object() {
        return Err(LiquidError::ConfigurationError(format!(
            "{} must hold a JSON object",
            path.display()
        )));
    }
    Ok(assigns_from_json(value))
}

/// Renders `template` with the engine described by `settings`.
pub fn render_template(
    mut settings: Settings,
    template: &Path,
    assigns: Assigns,
) -> LiquidResult<String> {
    let (name, _) = locate(&mut settings, template);
    let engine = Engine::from_settings(&settings);
    tracing::info!(template = %name, "rendering");
    engine.render_file(&name, assigns)
}

impl Command for RenderCommand {
    fn name(&self) -> &'static str {
        "render"
    }

    fn help(&self) -> &'static str {
        "Render a template file and print the output"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("template")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Template to render"),
        )
        .arg(
            clap::Arg::new("data")
                .long("data")
                .short('d')
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("JSON file with the variables to render against"),
        )
        .arg(
            clap::Arg::new("dir")
                .long("dir")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .action(clap::ArgAction::Append)
                .help("Template search directory (repeatable)"),
        )
        .arg(
            clap::Arg::new("no-cache")
                .long("no-cache")
                .action(clap::ArgAction::SetTrue)
                .help("Disable the parsed-document cache"),
        )
    }

    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> LiquidResult<String> {
        let mut settings = settings.clone();
        if let Some(dirs) = matches.get_many::<PathBuf>("dir") {
            settings.templates.dirs.extend(dirs.cloned());
        }
        if matches.get_flag("no-cache") {
            settings.cache.enabled = false;
        }

        let template = matches
            .get_one::<PathBuf>("template")
            .ok_or_else(|| LiquidError::ConfigurationError("No template given".to_string()))?;
        let assigns = match matches.get_one::<PathBuf>("data") {
            Some(path) => load_data(path)?,
            None => Assigns::new(),
        };

        render_template(settings, template, assigns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;

    #[test]
    fn test_render_with_include_next_to_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.liquid"), "<{% include 'part.liquid' %}>").unwrap();
        std::fs::write(dir.path().join("part.liquid"), "{{ who }}").unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(&data, r#"{"who": "world"}"#).unwrap();

        let out = render_template(
            Settings::default(),
            &dir.path().join("page.liquid"),
            load_data(&data).unwrap(),
        )
        .unwrap();
        assert_eq!(out, "<world>");
    }

    #[test]
    fn test_load_data_rejects_non_objects() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(&data, "[1, 2]").unwrap();
        assert!(matches!(
            load_data(&data),
            Err(LiquidError::ConfigurationError(_))
        ));

        std::fs::write(&data, "{ nope").unwrap();
        assert!(load_data(&data).is_err());
    }

    #[test]
    fn test_handle_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.liquid"), "{{ 'x' | upcase }}").unwrap();
        let path = dir.path().join("t.liquid");

        let mut registry = CommandRegistry::new();
        registry.register(Box::new(RenderCommand));
        let matches = registry
            .build_cli()
            .try_get_matches_from([
                "liquid-rs",
                "render",
                path.to_str().unwrap(),
                "--no-cache",
            ])
            .unwrap();
        assert_eq!(registry.execute(&matches, &Settings::default()).unwrap(), "X");
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_template(
            Settings::default(),
            &dir.path().join("absent.liquid"),
            Assigns::new(),
        )
        .unwrap_err();
        assert!(matches!(err, LiquidError::TemplateDoesNotExist(_)));
    }
}
