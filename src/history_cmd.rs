//! History subcommands.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Subcommand;

use screenreader_cv_lib::transfer::{export_history, history_file_name};
use screenreader_cv_lib::{render, HistoryUpdate};

use crate::{App, CliError};

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recorded items, most recent first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Find items whose text, tags or notes contain QUERY (case-insensitive)
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one item in full
    Show {
        id: String,
        #[arg(long)]
        boxes: bool,
        #[arg(long)]
        json: bool,
    },
    /// Delete one item
    Delete { id: String },
    /// Delete every item (analytics are kept)
    Clear,
    /// Replace an item's tags
    Tag { id: String, tags: Vec<String> },
    /// Replace an item's notes
    Note { id: String, text: String },
    /// Write the history as a JSON array
    Export {
        /// Output file or directory (default: ./ocr-history-YYYY-MM-DD.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// `output` if it names a file, otherwise `default_name` inside it (or in `.`).
pub fn output_path(output: Option<PathBuf>, default_name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(default_name),
        Some(path) => path,
        None => Path::new(".").join(default_name),
    }
}

fn missing(id: &str) -> CliError {
    CliError::Usage(format!("No history item with id {id}"))
}

pub fn run(cmd: HistoryCommands, app: &App) -> Result<(), CliError> {
    let mut store = app.store()?;
    match cmd {
        HistoryCommands::List { limit } => {
            let items = store.history();
            let shown = &items[..limit.unwrap_or(items.len()).min(items.len())];
            print!("{}", render::history_list(shown));
        }
        HistoryCommands::Search { query, limit } => {
            let hits = store.search(&query).take(limit.unwrap_or(usize::MAX));
            print!("{}", render::history_list(hits));
        }
        HistoryCommands::Show { id, boxes, json } => {
            let item = store.get(&id).ok_or_else(|| missing(&id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(item)?);
            } else {
                print!("{}", render::history_detail(item, boxes));
            }
        }
        HistoryCommands::Delete { id } => {
            if !store.delete(&id) {
                return Err(missing(&id));
            }
            println!("Deleted {id}");
        }
        HistoryCommands::Clear => {
            let count = store.history().len();
            store.clear_history();
            println!("Removed {count} items");
        }
        HistoryCommands::Tag { id, tags } => {
            let update = HistoryUpdate {
                tags: Some(tags),
                notes: None,
            };
            if !store.update(&id, update) {
                return Err(missing(&id));
            }
        }
        HistoryCommands::Note { id, text } => {
            let update = HistoryUpdate {
                tags: None,
                notes: Some(text),
            };
            if !store.update(&id, update) {
                return Err(missing(&id));
            }
        }
        HistoryCommands::Export { output } => {
            let path = output_path(output, &history_file_name(Utc::now().date_naive()));
            std::fs::write(&path, export_history(store.history())?)?;
            println!("Exported {} items to {}", store.history().len(), path.display());
        }
    }
    Ok(())
}
