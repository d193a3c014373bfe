use std::path::PathBuf;
use std::process::ExitCode;

use liquid_rs_cli::command::CommandRegistry;
use liquid_rs_cli::commands::register_builtin_commands;
use liquid_rs_core::logging::setup_logging;
use liquid_rs_core::settings_loader;

fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match matches.get_one::<String>("settings").map(PathBuf::from) {
        Some(path) => match settings_loader::from_toml_file_with_env(&path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => settings_loader::from_env(),
    };
    setup_logging(&settings);

    match registry.execute(&matches, &settings) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
