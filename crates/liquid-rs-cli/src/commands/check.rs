//! The `check` command.
//!
//! Parses each given template, which also loads everything it includes or
//! extends, and reports the ones that fail.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use liquid_rs_core::{LiquidError, LiquidResult, Settings};
use liquid_rs_template::Engine;

use super::locate;
use crate::command::Command;

pub struct CheckCommand;

/// The outcome of checking one template.
#[derive(Debug)]
pub struct CheckReport {
    pub path: PathBuf,
    pub error: Option<LiquidError>,
}

impl CheckReport {
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Parses `template` and reports whether it is well formed.
pub fn check_template(mut settings: Settings, template: &Path) -> CheckReport {
    let (name, _) = locate(&mut settings, template);
    let engine = Engine::from_settings(&settings);
    let error = engine.parse_file(&name).err();
    match &error {
        Some(err) => tracing::warn!(template = %template.display(), error = %err, "check failed"),
        None => tracing::debug!(template = %template.display(), "check passed"),
    }
    CheckReport {
        path: template.to_path_buf(),
        error,
    }
}

impl Command for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Parse templates and report syntax errors"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("templates")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Templates to check"),
        )
        .arg(
            clap::Arg::new("dir")
                .long("dir")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .action(clap::ArgAction::Append)
                .help("Template search directory (repeatable)"),
        )
    }

    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> LiquidResult<String> {
        let mut settings = settings.clone();
        if let Some(dirs) = matches.get_many::<PathBuf>("dir") {
            settings.templates.dirs.extend(dirs.cloned());
        }
        settings.cache.enabled = false;

        let reports: Vec<CheckReport> = matches
            .get_many::<PathBuf>("templates")
            .into_iter()
            .flatten()
            .map(|path| check_template(settings.clone(), path))
            .collect();

        let mut summary = String::new();
        let mut failures = 0;
        for report in &reports {
            match &report.error {
                None => {
                    let _ = writeln!(summary, "ok      {}", report.path.display());
                }
                Some(err) => {
                    failures += 1;
                    let _ = writeln!(summary, "FAILED  {}: {err}", report.path.display());
                }
            }
        }

        if failures > 0 {
            return Err(LiquidError::syntax(format!(
                "{failures} of {} template(s) failed to parse\n{}",
                reports.len(),
                summary.trim_end()
            )));
        }
        Ok(summary.trim_end().to_string())
    }
}
