use std::path::Path;

use anyhow::Context as _;
use tracing::instrument;

use crate::cli::terminal::Colorize;

/// Show or modify configuration settings
///
/// Settings are stored in `config.toml` inside the state directory. A missing
/// file means every setting has its default.
///
/// Available keys:
///   server                Backend origin, e.g. `http://localhost:8080`
///   `poll_interval_ms`      Delay between screening status polls
///   `poll_timeout_secs`     Stop waiting on a screening after this long (0 waits forever)
///   `page_size`             Rows per page of paged listings
///   `request_timeout_secs`  Timeout of each HTTP request
///   `export_dir`            Directory CSV exports are written to
#[derive(Debug, clap::Parser)]
pub struct Config {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Parser)]
enum ConfigCommand {
    /// Show all configuration values
    Show,

    /// Get a specific configuration value
    Get {
        /// Configuration key to retrieve
        key: String,
    },

    /// Set a configuration value
    ///
    /// Examples:
    ///   kyc config set server <https://kyc.example.com>
    ///   kyc config set `page_size` 25
    Set {
        /// Configuration key to set
        key: String,

        /// Value to set
        value: String,
    },
}

impl Config {
    #[instrument]
    pub fn run(self, config_path: &Path) -> anyhow::Result<()> {
        let mut config = kyc_console::Config::load_or_default(config_path)?;

        match self.command {
            ConfigCommand::Show => {
                println!("Configuration {}:", config_path.display().to_string().dim());
                for key in kyc_console::Config::KEYS {
                    println!("  {key}: {}", config.get(key)?);
                }
            }
            ConfigCommand::Get { key } => {
                let value = config.get(&key).with_context(|| {
                    format!("Available keys:\n  {}", kyc_console::Config::KEYS.join("\n  "))
                })?;
                println!("{value}");
            }
            ConfigCommand::Set { key, value } => {
                config.set(&key, &value)?;
                config.save(config_path)?;
                println!(
                    "{}",
                    format!("Set {key} = {}", config.get(&key)?).success()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn set_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        Config::try_parse_from(["config", "set", "page_size", "25"])
            .unwrap()
            .run(&path)
            .unwrap();

        let saved = kyc_console::Config::load(&path).unwrap();
        assert_eq!(saved.page_size, 25);
        assert_eq!(saved.server, kyc_console::Config::default().server);
    }

    #[test]
    fn bad_values_leave_the_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let result = Config::try_parse_from(["config", "set", "page_size", "0"])
            .unwrap()
            .run(&path);

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn unknown_keys_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::try_parse_from(["config", "get", "colour"])
            .unwrap()
            .run(&dir.path().join("config.toml"));

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("server"));
        assert!(message.contains("unknown config key 'colour'"));
    }
}
