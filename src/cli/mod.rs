use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::storage::{self, Persistence};

pub mod commands;

use self::commands::{AddArgs, CommandContext, DeleteArgs, EditArgs, FavoriteArgs, ListArgs, ThemeArgs};

const LOG_FILE_NAME: &str = "cardgallery.log";

#[derive(Parser, Debug)]
#[command(
    name = "cardgallery",
    version,
    about = "Terminal card gallery for short categorised messages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over CARDGALLERY_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over CARDGALLERY_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Read the built-in messages from this JSON file instead of the configured one
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive gallery (default)
    Tui,
    /// Print messages matching the given filters
    List(ListArgs),
    /// Create a custom message, one per category
    Add(AddArgs),
    /// Replace the text of a custom message
    Edit(EditArgs),
    /// Delete a custom message
    Delete(DeleteArgs),
    /// Toggle a message in favorites
    Favorite(FavoriteArgs),
    /// List every known category
    Categories,
    /// Show, set or toggle the colour theme
    Theme(ThemeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("CARDGALLERY_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("CARDGALLERY_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_dir.join(LOG_FILE_NAME));
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }
    let storage = storage::init(&paths, &config.storage)?;
    tracing::info!(
        database = %storage.database_path().display(),
        catalog = %config.catalog_path.display(),
        page_size = config.page_size,
        "cardgallery starting"
    );
    let persistence = Persistence::new(storage);

    let config = Arc::new(config);
    let context = CommandContext::new(config.clone(), persistence.clone());
    match command {
        Commands::Tui => {
            let mut app = App::new(config, persistence);
            commands::run_tui(&mut app)
        }
        Commands::List(args) => commands::list(&context, args),
        Commands::Add(args) => commands::add(&context, args),
        Commands::Edit(args) => commands::edit(&context, args),
        Commands::Delete(args) => commands::delete(&context, args),
        Commands::Favorite(args) => commands::favorite(&context, args),
        Commands::Categories => commands::categories(&context),
        Commands::Theme(args) => commands::theme(&context, args),
    }
}

/// Logs go to stderr, or to `log_file` while the terminal UI owns the screen.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
