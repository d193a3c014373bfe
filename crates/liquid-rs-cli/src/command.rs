//! Subcommand framework for the `liquid-rs` binary.
//!
//! Each subcommand implements [`Command`] and is registered in a
//! [`CommandRegistry`], which builds the clap parser and dispatches on the
//! matched subcommand name.

use std::collections::BTreeMap;

use liquid_rs_core::{LiquidError, LiquidResult, Settings};

/// A subcommand of the `liquid-rs` binary.
pub trait Command: Send + Sync {
    /// The name used to invoke this command.
    fn name(&self) -> &'static str;

    /// One-line help text.
    fn help(&self) -> &'static str;

    /// Adds arguments to the clap subcommand. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Runs the command and returns the text to print on success.
    fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> LiquidResult<String>;
}

/// A name-keyed set of commands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, replacing one with the same name.
    pub fn register(&mut self, command: Box<dyn Command>) {
        self.commands.insert(command.name(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Registered command names, sorted.
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.keys().copied().collect()
    }

    /// Builds the top-level clap command with one subcommand per entry.
    pub fn build_cli(&self) -> clap::Command {
        let app = clap::Command::new("liquid-rs")
            .about("Render and check Liquid templates")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .global(true)
                    .value_name("FILE")
                    .help("TOML settings file"),
            );

        self.commands.values().fold(app, |app, cmd| {
            let sub = clap::Command::new(cmd.name()).about(cmd.help());
            app.subcommand(cmd.add_arguments(sub))
        })
    }

    /// Dispatches to the command named by the matched subcommand.
    pub fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> LiquidResult<String> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            LiquidError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self
            .get(name)
            .ok_or_else(|| LiquidError::ConfigurationError(format!("Unknown command: {name}")))?;

        tracing::debug!(command = name, "dispatching");
        cmd.handle(sub_matches, settings)
    }
}
