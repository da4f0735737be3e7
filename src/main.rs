//! Emphizor - spaced repetition flashcards in the terminal
//!
//! Review due cards, rate how well you remembered them, and let FSRS decide
//! when you see them again.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use emphizor::config::Config;
use emphizor::storage::JsonUserStore;
use emphizor::ui::App;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "emphizor")]
#[command(author, version, about = "Spaced repetition flashcards for the terminal", long_about = None)]
struct Args {
    /// Config file to use instead of the default one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding user data and the log file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Profile to study as
    #[arg(short, long)]
    user: Option<String>,

    /// Import cards from a CSV file (question,answer[,tags])
    #[arg(short, long)]
    import: Option<PathBuf>,

    /// Write a backup of every user and exit
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    export_backup: Option<PathBuf>,

    /// Restore users from a backup file and exit
    #[arg(long, value_name = "FILE")]
    import_backup: Option<PathBuf>,
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let file_config = Config::load_from(&config_path)?;
    let mut config = file_config.clone();
    if let Some(user) = args.user {
        config.user = user;
    }

    let data_dir = args
        .data_dir
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(JsonUserStore::default_path);

    init_logging(&data_dir, &config.log_level)?;
    tracing::info!(data_dir = %data_dir.display(), user = %config.user, "starting");

    let store = JsonUserStore::new(data_dir)?;

    if let Some(csv_path) = args.import {
        let mut user = store.open_or_create(&config.user)?;
        let count = store.import_csv(&mut user, &csv_path, chrono::Utc::now())?;
        store.save_user(&user)?;
        println!("✓ Imported {} cards for '{}'", count, user.name());
        return Ok(());
    }

    if let Some(path) = args.export_backup {
        let path = if path.as_os_str().is_empty() {
            JsonUserStore::default_backup_path()
        } else {
            path
        };
        let count = store.export_backup(&path)?;
        println!("✓ Backed up {} users to {}", count, path.display());
        return Ok(());
    }

    if let Some(path) = args.import_backup {
        let (imported, skipped) = store.import_backup(&path)?;
        println!("✓ Restored {} users ({} already present)", imported, skipped);
        return Ok(());
    }

    // Run TUI
    run_tui(store, &config, file_config, &config_path)
}

fn init_logging(data_dir: &Path, default_filter: &str) -> Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    let log_path = data_dir.join("emphizor.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn run_tui(
    store: JsonUserStore,
    config: &Config,
    mut file_config: Config,
    config_path: &Path,
) -> Result<()> {
    // Build the app before touching the terminal so load errors print normally
    let mut app = App::new(store, config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Remember the tag scope for next time
    let active_tags: Vec<String> = app.active_tags.iter().cloned().collect();
    if active_tags != file_config.active_tags {
        file_config.active_tags = active_tags;
        if let Err(e) = file_config.save_to(config_path) {
            tracing::warn!("Failed to save config: {:#}", e);
        }
    }

    if app.unsaved {
        eprintln!("Warning: some progress could not be saved. See emphizor.log for details.");
    }

    // Handle any errors
    if let Err(err) = result {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", err);
        return Err(err);
    }

    tracing::info!("exiting");
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|frame| app.render(frame))?;
        app.handle_events()?;
    }
    Ok(())
}
