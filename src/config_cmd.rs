use clap::Subcommand;

use screenreader_cv_lib::config::{self, ClientConfig, RawConfig, CONFIG_KEYS};

use crate::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the stored file and the effective values
    Show,
    /// Store one value; an empty VALUE clears it
    Set { key: String, value: String },
    /// Print where the config file lives
    Path,
}

pub fn run(cmd: ConfigCommands, mut raw: RawConfig, effective: &ClientConfig) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Show => {
            println!("Stored:");
            println!("{}", serde_json::to_string_pretty(&raw)?);
            println!("Effective:");
            println!("  backend_url           {}", effective.backend_url);
            println!("  log_level             {}", effective.log_level);
            println!(
                "  request_timeout_secs  {}",
                effective.request_timeout.as_secs()
            );
            println!("  data_dir              {}", effective.data_dir.display());
        }
        ConfigCommands::Set { key, value } => {
            raw.set(&key, &value).map_err(|err| {
                CliError::Usage(format!("{err} (keys: {})", CONFIG_KEYS.join(", ")))
            })?;
            let path = config::save_raw_config(raw)?;
            println!("Saved {}", path.display());
        }
        ConfigCommands::Path => match config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => return Err(config::ConfigError::NoConfigDir.into()),
        },
    }
    Ok(())
}
