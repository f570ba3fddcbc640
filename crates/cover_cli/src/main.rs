//! Cover Studio - command line front end.
//!
//! Sends songs and training data to the backend, watches jobs and
//! downloads the resulting tracks.

mod commands;
mod presenter;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cover_core::config::ConfigManager;
use cover_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "cover-studio", version, about = "Song covers in your own voice")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the user id, artist or backend URL in the config file
    Configure {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Find a song by title, artist or URL
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Upload a song for vocal/instrument separation
    Separate {
        file: PathBuf,
        /// Poll until the separation finishes
        #[arg(long)]
        wait: bool,
    },

    /// Upload training data for the voice model
    Train { files: Vec<PathBuf> },

    /// Show voice model training status
    TrainStatus {
        /// Poll until training finishes
        #[arg(long)]
        wait: bool,
    },

    /// Upload a song for conversion with the trained voice
    ConvertUpload { file: PathBuf },

    /// Combine the converted vocal with the instrumental
    Convert {
        /// Name of the uploaded song
        filename: String,
        /// Wait for the converted vocal and the instrumental
        #[arg(long)]
        wait: bool,
        /// Save the resulting tracks to the download folder
        #[arg(long)]
        download: bool,
    },

    /// Download a track
    Fetch {
        locator: String,
        /// Output directory (defaults to the download folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn default_config_path() -> Result<PathBuf> {
    if let Some(dirs) = directories::ProjectDirs::from("", "", "cover-studio") {
        return Ok(dirs.config_dir().join("cover-studio.toml"));
    }
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    Ok(cwd.join(".config").join("cover-studio.toml"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    let mut config_manager = ConfigManager::new(&config_path);
    if let Err(e) = config_manager.load_or_create() {
        eprintln!("Warning: Failed to load config: {}", e);
    }

    let logging = config_manager.settings().logging.clone();
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        logging.level
    };
    let _log_guard = if logging.file_logging {
        Some(init_tracing_with_file(level, &config_manager.logs_folder()))
    } else {
        init_tracing(level);
        None
    };

    tracing::info!("Starting Cover Studio");
    tracing::info!("Config: {}", config_path.display());
    tracing::info!("Core version: {}", cover_core::version());

    if let Err(e) = config_manager.ensure_dirs_exist() {
        tracing::error!("Failed to create directories: {}", e);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping...");
            on_interrupt.cancel();
        }
    });

    commands::run(cli.command, &mut config_manager, cancel).await
}
