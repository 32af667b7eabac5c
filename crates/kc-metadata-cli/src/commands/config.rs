//! Configuration management commands.

use std::path::Path;

use crate::cli::ConfigCommand;
use crate::output::{info, success};
use crate::CliConfig;

/// Runs a config command against the file at `path`.
pub fn run_config(cmd: ConfigCommand, config: &CliConfig, path: &Path) -> crate::CliResult<()> {
    match cmd {
        ConfigCommand::Show => show_config(config, path),
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Init { force } => init_config(config, path, force),
    }
}

/// Shows the current configuration.
fn show_config(config: &CliConfig, path: &Path) -> crate::CliResult<()> {
    info(&format!("Configuration file: {}", path.display()));
    println!();

    let content = toml::to_string_pretty(config)
        .map_err(|e| crate::CliError::Config(format!("failed to serialize config: {e}")))?;
    println!("{content}");
    Ok(())
}

/// Writes the configuration file.
fn init_config(config: &CliConfig, path: &Path, force: bool) -> crate::CliResult<()> {
    if path.exists() && !force {
        return Err(crate::CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config.save_to(path)?;
    success(&format!("Wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kc-metadata.toml");

        run_config(ConfigCommand::Init { force: false }, &CliConfig::default(), &path).unwrap();
        assert!(path.exists());

        let again = run_config(ConfigCommand::Init { force: false }, &CliConfig::default(), &path);
        assert!(matches!(again, Err(crate::CliError::InvalidArgument(_))));
        run_config(ConfigCommand::Init { force: true }, &CliConfig::default(), &path).unwrap();
    }
}
