use anyhow::Result;
use clap::Parser;
use sampledex_etl::{Config, DatabaseRegistry};
use std::path::PathBuf;

mod commands;
mod player;
mod tui;

#[derive(Debug, Parser)]
#[command(name = "sampledex", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Sample database directory (default: the last used database, then
    /// `database_path` from the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Index a folder of audio samples
    ///
    /// Recursively walks the folder and, for every audio file not yet in the
    /// selected database:
    ///
    /// - Reads its duration and skips files longer than max_duration_secs
    /// - Embeds the audio with the configured embedding model
    /// - Estimates BPM and key with the builtin analyzer
    /// - Stores the sample in the database
    ///
    /// Supported formats: WAV, MP3, AIF/AIFF, FLAC, OGG, OPUS, M4A, AAC
    ///
    /// Indexing is incremental: files already in the database are skipped, so
    /// re-running on a folder only picks up new samples.
    Index {
        /// Path to the sample folder
        path: PathBuf,
    },
    /// Search samples with a natural-language description
    Search(commands::search::SearchArgs),
    /// Re-derive BPM and key for samples in a database
    ///
    /// Without --force only samples missing a BPM or key are analyzed; the
    /// external engine also takes over samples analyzed by the builtin one.
    Reanalyze {
        /// Reanalyze every sample
        #[arg(long)]
        force: bool,

        /// Analysis engine to run
        #[arg(long, value_enum, default_value_t = commands::reanalyze::EngineArg::Builtin)]
        engine: commands::reanalyze::EngineArg,

        /// Database directory, in either path convention (overrides --db)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Metadata updates written per transaction (default: batch_size from config)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Run the external analysis engine in the secondary environment
    RemoteAnalyze {
        /// Reanalyze every sample
        #[arg(long)]
        force: bool,
    },
    /// Interactive search
    Tui,
    /// Manage the list of sample databases
    Db {
        #[command(subcommand)]
        action: DbCommand,
    },
    /// Show statistics for the selected database
    Status,
    /// Convert paths between drive-letter and mount-point conventions
    Path {
        #[command(subcommand)]
        action: PathCommand,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, clap::Subcommand)]
enum DbCommand {
    /// List registered databases
    List,
    /// Register a database
    Add { path: PathBuf },
    /// Select the database used by default
    Use { path: PathBuf },
    /// Unregister a database (files are left in place)
    Remove { path: PathBuf },
}

#[derive(Debug, clap::Subcommand)]
enum PathCommand {
    /// D:\Samples\kick.wav -> /mnt/d/Samples/kick.wav
    ToMount { path: String },
    /// /mnt/d/Samples/kick.wav -> D:\Samples\kick.wav
    ToDrive {
        path: String,
        /// Use forward slashes
        #[arg(long)]
        forward: bool,
    },
    /// Drag-out file:// URL for a sample path
    Url { path: String },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get { key: Option<String> },
    /// Set a value in the config file
    Set { key: String, value: String },
    /// Print the config file path
    Path,
    /// Print an annotated example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

/// The database to work on: `--db`, then the last used one, then the
/// configured default.
fn resolve_db(cli_db: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    let registry = DatabaseRegistry::load()?;
    Ok(registry.resolve(cli_db.as_deref(), &config.database_path))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigCommand::Show => commands::config::show_config()?,
            ConfigCommand::Get { key } => commands::config::get_config(key)?,
            ConfigCommand::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigCommand::Path => commands::config::show_path(),
            ConfigCommand::Example => commands::config::show_example(),
            ConfigCommand::Init => commands::config::init_config()?,
        },
        Commands::Path { action } => match action {
            PathCommand::ToMount { path } => commands::path::to_mount(&path),
            PathCommand::ToDrive { path, forward } => commands::path::to_drive(&path, forward),
            PathCommand::Url { path } => commands::path::to_url(&path),
        },
        Commands::Db { action } => match action {
            DbCommand::List => commands::db::list()?,
            DbCommand::Add { path } => commands::db::add(path)?,
            DbCommand::Use { path } => commands::db::select(path)?,
            DbCommand::Remove { path } => commands::db::remove(&path)?,
        },
        command => {
            let config = Config::load()?;
            let db_path = resolve_db(cli.db, &config)?;

            match command {
                Commands::Index { path } => {
                    commands::run_index(path, db_path, &config).await?;
                }
                Commands::Search(args) => {
                    commands::run_search(&args, &db_path, &config).await?;
                }
                Commands::Reanalyze {
                    force,
                    engine,
                    db_path: explicit,
                    batch_size,
                } => {
                    let db_path = explicit
                        .map(|p| commands::reanalyze::resolve_db_path(&p))
                        .unwrap_or(db_path);
                    let batch_size = batch_size.unwrap_or(config.batch_size);
                    commands::run_reanalyze(&db_path, engine, force, batch_size, &config)?;
                }
                Commands::RemoteAnalyze { force } => {
                    commands::run_remote(&db_path, force, &config).await?;
                }
                Commands::Tui => {
                    tui::run_tui(&db_path, &config).await?;
                }
                Commands::Status => {
                    commands::show_status(&db_path)?;
                }
                Commands::Config { .. } | Commands::Path { .. } | Commands::Db { .. } => {}
            }
        }
    }

    Ok(())
}
