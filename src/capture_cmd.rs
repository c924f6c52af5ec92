//! Capture, upload and the interactive shortcut loop.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use screenreader_cv_lib::shortcuts::{Chord, ShortcutAction, ShortcutMap};
use screenreader_cv_lib::{
    render, CaptureController, CaptureError, CaptureMode, CaptureOutcome, DefaultEngine,
    EngineToggles, Region,
};

use crate::{App, CliError};

#[derive(Args, Debug, Clone, Default)]
pub struct OcrOptions {
    /// Engines to use: tesseract, easyocr or both (default: the defaultEngine setting)
    #[arg(long)]
    pub engine: Option<String>,
    /// Print bounding boxes under the text
    #[arg(long)]
    pub boxes: bool,
    /// Print the recorded history item as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum CaptureCommands {
    /// Read the whole screen
    Screen {
        #[command(flatten)]
        opts: OcrOptions,
    },
    /// Read a rectangle of the screen
    Region {
        #[arg(long, default_value_t = 0)]
        x: i32,
        #[arg(long, default_value_t = 0)]
        y: i32,
        #[arg(long, default_value_t = 800)]
        width: i32,
        #[arg(long, default_value_t = 600)]
        height: i32,
        #[command(flatten)]
        opts: OcrOptions,
    },
}

pub async fn run(cmd: CaptureCommands, app: &App) -> Result<(), CliError> {
    match cmd {
        CaptureCommands::Screen { opts } => one_shot(CaptureMode::Screen, opts, app).await,
        CaptureCommands::Region {
            x,
            y,
            width,
            height,
            opts,
        } => {
            let region = Region {
                x,
                y,
                width,
                height,
            };
            one_shot(CaptureMode::Region(region), opts, app).await
        }
    }
}

pub async fn upload(path: PathBuf, opts: OcrOptions, app: &App) -> Result<(), CliError> {
    if !path.is_file() {
        return Err(CliError::Usage(format!("Not a file: {}", path.display())));
    }
    one_shot(CaptureMode::Upload(path), opts, app).await
}

async fn one_shot(mode: CaptureMode, opts: OcrOptions, app: &App) -> Result<(), CliError> {
    let controller = app.controller()?;
    if let Some(raw) = &opts.engine {
        let engine = DefaultEngine::from_str(raw)
            .ok_or_else(|| CliError::Usage(format!("Unknown engine: {raw}")))?;
        controller.set_toggles(EngineToggles::from(engine));
    }
    let outcome = controller.capture(mode).await?;
    print_outcome(&outcome, &opts)
}

fn print_outcome(outcome: &CaptureOutcome, opts: &OcrOptions) -> Result<(), CliError> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&outcome.item)?);
    } else {
        print!("{}", render::result(&outcome.item.result, opts.boxes));
        println!("\nSaved as {}", outcome.item.id);
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn print_status(controller: &CaptureController) {
    let toggles = controller.toggles();
    let region = controller.region();
    println!(
        "Tesseract {}, EasyOCR {}, region mode {} ({},{} {}x{})",
        on_off(toggles.tesseract),
        on_off(toggles.easyocr),
        on_off(controller.region_mode()),
        region.x,
        region.y,
        region.width,
        region.height
    );
}

/// `region X Y WIDTH HEIGHT`
fn parse_region(args: &str) -> Option<Region> {
    let nums: Vec<i32> = args
        .split_whitespace()
        .map(str::parse::<i32>)
        .collect::<Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        [x, y, width, height] if *width > 0 && *height > 0 => Some(Region {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

fn report(result: Result<CaptureOutcome, CaptureError>) {
    match result {
        Ok(outcome) if outcome.displayed => {
            print!("{}", render::result(&outcome.item.result, true));
        }
        Ok(outcome) => println!("Recorded {} (a newer result is shown)", outcome.item.id),
        Err(err) => println!("{err}"),
    }
}

pub async fn interactive(app: &App) -> Result<(), CliError> {
    let controller = app.controller()?;
    let shortcuts = ShortcutMap::from_settings(app.store()?.settings());
    print!("{}", shortcuts.help_text());
    println!("Also: `region X Y W H`, `status`, `quit`.");
    print_status(&controller);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting_path = false;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if awaiting_path {
            awaiting_path = false;
            let path = PathBuf::from(input);
            if path.is_file() {
                report(controller.capture(CaptureMode::Upload(path)).await);
            } else {
                println!("Not a file: {}", path.display());
            }
            continue;
        }
        match input {
            "quit" | "exit" | "q" => break,
            "status" => {
                print_status(&controller);
                continue;
            }
            _ => {}
        }
        if let Some(args) = input.strip_prefix("region ") {
            match parse_region(args) {
                Some(region) => {
                    controller.set_region(region);
                    print_status(&controller);
                }
                None => println!("Usage: region X Y WIDTH HEIGHT"),
            }
            continue;
        }

        let chord = match Chord::parse(input) {
            Ok(chord) => chord,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        let Some(action) = shortcuts.lookup(&chord) else {
            if shortcuts.is_enabled() {
                println!("Nothing bound to {chord}");
            } else {
                println!("Keyboard shortcuts are disabled in settings");
            }
            continue;
        };

        match action {
            ShortcutAction::Capture => report(controller.capture_active().await),
            ShortcutAction::Upload => {
                println!("Image path:");
                awaiting_path = true;
            }
            ShortcutAction::ClearResults => {
                controller.clear_result();
                println!("Result cleared");
            }
            ShortcutAction::ToggleRegionMode => {
                controller.toggle_region_mode();
                print_status(&controller);
            }
            ShortcutAction::ToggleTesseract => {
                controller.toggle_tesseract();
                print_status(&controller);
            }
            ShortcutAction::ToggleEasyocr => {
                controller.toggle_easyocr();
                print_status(&controller);
            }
            ShortcutAction::Help => print!("{}", shortcuts.help_text()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        assert_eq!(
            parse_region("10 20 300 200"),
            Some(Region {
                x: 10,
                y: 20,
                width: 300,
                height: 200
            })
        );
        assert_eq!(parse_region("10 20 0 200"), None);
        assert_eq!(parse_region("10 20 300"), None);
        assert_eq!(parse_region("a b c d"), None);
    }
}
