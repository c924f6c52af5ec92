use clap::Subcommand;

use screenreader_cv_lib::settings::SETTING_KEYS;
use screenreader_cv_lib::{render, SettingsPatch};

use crate::{App, CliError};

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the current settings
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Change one setting, e.g. `set maxHistoryItems 200`
    Set { key: String, value: String },
    /// Restore every default
    Reset,
}

pub fn run(cmd: SettingsCommands, app: &App) -> Result<(), CliError> {
    let mut store = app.store()?;
    match cmd {
        SettingsCommands::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.settings())?);
            } else {
                print!("{}", render::settings(store.settings()));
            }
        }
        SettingsCommands::Set { key, value } => {
            let patch = SettingsPatch::from_key_value(&key, &value).map_err(|err| {
                CliError::Usage(format!("{err} (keys: {})", SETTING_KEYS.join(", ")))
            })?;
            let saved = store.save_settings(patch)?;
            print!("{}", render::settings(saved));
        }
        SettingsCommands::Reset => {
            if store.reset_settings() {
                println!("Settings restored to defaults");
            } else {
                println!("Settings already at defaults");
            }
        }
    }
    Ok(())
}
