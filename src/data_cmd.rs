//! Whole-envelope backup and restore.

use std::path::PathBuf;

use chrono::Utc;
use clap::Subcommand;

use screenreader_cv_lib::transfer::backup_file_name;

use crate::history_cmd::output_path;
use crate::{App, CliError};

#[derive(Subcommand)]
pub enum DataCommands {
    /// Write history, analytics and settings to one JSON file
    Export {
        /// Output file or directory (default: ./screenreader-cv-backup-YYYY-MM-DD.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace all local data with a backup file
    Import { path: PathBuf },
}

pub fn run(cmd: DataCommands, app: &App) -> Result<(), CliError> {
    match cmd {
        DataCommands::Export { output } => {
            let json = app.store()?.export()?;
            let path = output_path(output, &backup_file_name(Utc::now().date_naive()));
            std::fs::write(&path, json)?;
            println!("Backup written to {}", path.display());
        }
        DataCommands::Import { path } => {
            let blob = std::fs::read_to_string(&path)?;
            let mut store = app.store()?;
            store.import(&blob)?;
            println!(
                "Imported {} history items from {}",
                store.history().len(),
                path.display()
            );
        }
    }
    Ok(())
}
