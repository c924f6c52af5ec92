mod capture_cmd;
mod config_cmd;
mod data_cmd;
mod history_cmd;
mod settings_cmd;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, MutexGuard};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::error;

use screenreader_cv_lib::config::{self, ClientConfig, ConfigError};
use screenreader_cv_lib::shortcuts::ShortcutMap;
use screenreader_cv_lib::{
    init_tracing, render, AppStore, BackendClient, BackendError, CaptureController, CaptureError,
    FileStorage, SettingsError, SharedStore, StorageError, TracingNotifier, TransferError,
};

#[derive(Parser)]
#[command(name = "screenreader-cv")]
#[command(about = "Screen Reader CV client: OCR capture, history and analytics")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides SCREENREADER_CV_BACKEND_URL and the config file)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the screen or a region and extract its text
    Capture {
        #[command(subcommand)]
        target: capture_cmd::CaptureCommands,
    },
    /// Upload an image file and extract its text
    Upload {
        path: PathBuf,
        #[command(flatten)]
        opts: capture_cmd::OcrOptions,
    },
    /// Read shortcut chords (e.g. `ctrl+s`) from stdin and drive captures
    Interactive,
    /// Browse and edit the OCR history
    History {
        #[command(subcommand)]
        cmd: history_cmd::HistoryCommands,
    },
    /// Show cumulative analytics
    Analytics {
        #[arg(long)]
        json: bool,
    },
    /// Show or change user settings
    Settings {
        #[command(subcommand)]
        cmd: settings_cmd::SettingsCommands,
    },
    /// Back up or restore all local data
    Data {
        #[command(subcommand)]
        cmd: data_cmd::DataCommands,
    },
    /// Show or change client configuration
    Config {
        #[command(subcommand)]
        cmd: config_cmd::ConfigCommands,
    },
    /// List keyboard shortcuts
    Shortcuts,
    /// Check whether the backend is reachable
    Health,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

/// Resolved configuration plus the opened store, shared by every command.
pub struct App {
    pub config: ClientConfig,
    pub store: SharedStore,
}

impl App {
    pub fn store(&self) -> Result<MutexGuard<'_, AppStore>, CliError> {
        self.store
            .lock()
            .map_err(|_| CliError::Storage(StorageError::Poisoned))
    }

    pub fn client(&self) -> Result<BackendClient, CliError> {
        Ok(BackendClient::new(
            &self.config.backend_url,
            self.config.request_timeout,
        )?)
    }

    pub fn controller(&self) -> Result<CaptureController, CliError> {
        Ok(CaptureController::new(
            self.client()?,
            Arc::clone(&self.store),
            Arc::new(TracingNotifier),
        ))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let raw = config::load_or_default_config();
    let client_config = match ClientConfig::resolve(&raw, cli.backend_url.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(client_config.log_level);

    // Config edits never touch app data.
    if let Commands::Config { cmd } = cli.command {
        return finish(config_cmd::run(cmd, raw, &client_config));
    }

    let storage = FileStorage::new(&client_config.data_dir);
    let app = App {
        config: client_config,
        store: AppStore::open(Box::new(storage)).into_shared(),
    };

    let result = run(cli.command, &app).await;
    let flushed = app
        .store()
        .and_then(|mut store| store.flush_if_dirty().map_err(CliError::from));
    finish(result.and(flushed))
}

fn finish(result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, app: &App) -> Result<(), CliError> {
    match command {
        Commands::Capture { target } => capture_cmd::run(target, app).await,
        Commands::Upload { path, opts } => capture_cmd::upload(path, opts, app).await,
        Commands::Interactive => capture_cmd::interactive(app).await,
        Commands::History { cmd } => history_cmd::run(cmd, app),
        Commands::Settings { cmd } => settings_cmd::run(cmd, app),
        Commands::Data { cmd } => data_cmd::run(cmd, app),
        Commands::Analytics { json } => {
            let store = app.store()?;
            let analytics = &store.data().analytics;
            if json {
                println!("{}", serde_json::to_string_pretty(analytics)?);
            } else {
                print!("{}", render::analytics(analytics));
            }
            Ok(())
        }
        Commands::Shortcuts => {
            let map = ShortcutMap::from_settings(app.store()?.settings());
            print!("{}", map.help_text());
            Ok(())
        }
        Commands::Health => {
            let client = app.client()?;
            if client.health_check().await {
                println!("Backend at {} is healthy", client.base_url());
                Ok(())
            } else {
                Err(CliError::Usage(format!(
                    "Backend at {} is not reachable",
                    client.base_url()
                )))
            }
        }
        // Handled before the store is opened.
        Commands::Config { .. } => Ok(()),
    }
}
