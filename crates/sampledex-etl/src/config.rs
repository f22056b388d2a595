use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default embedding model served by the local embedding service.
pub const DEFAULT_EMBEDDING_MODEL: &str = "laion/larger_clap_music_and_speech";

/// Configuration for sampledex.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (SAMPLEDEX_* prefix)
/// 3. Config file (~/.config/sampledex/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sample database directory used when neither `--db` nor the registry
    /// names one.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/sample_db
    /// - ENV: SAMPLEDEX_DATABASE_PATH
    /// - Config: database_path = "/path/to/sample_db"
    /// - Default: ./sample_db
    pub database_path: PathBuf,

    /// Files longer than this many seconds are not indexed.
    pub max_duration_secs: f64,

    /// Number of metadata updates written per transaction during
    /// reanalysis.
    pub batch_size: usize,

    pub embedding: EmbeddingConfig,
    pub external: ExternalConfig,
    pub remote: RemoteConfig,
}

/// Where the embedding model is served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// The external analysis program.
///
/// It is run once per file with the audio path appended to `args` and
/// must print `{"bpm": .., "key": .., "strength": ..}` on stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub program: Option<String>,
    pub args: Vec<String>,
}

/// How the secondary environment is reached for `remote-analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Command that enters the secondary environment.
    pub launcher: String,
    /// Conda environment prefix, tried first.
    pub env_path: Option<String>,
    /// Named conda environment, tried when `env_path` fails.
    pub env_name: String,
    /// The sampledex binary inside the secondary environment.
    pub program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            max_duration_secs: 10.0,
            batch_size: 50,
            embedding: EmbeddingConfig::default(),
            external: ExternalConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8765".to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            launcher: "wsl".to_string(),
            env_path: None,
            env_name: "env_wsl".to_string(),
            program: "sampledex".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/sampledex/config.toml
    /// Reads environment variables with SAMPLEDEX_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("sampledex");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with a custom database directory.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }
}

/// The database directory used when nothing else is configured.
pub fn default_db_path() -> PathBuf {
    PathBuf::from("./sample_db")
}

/// Directory holding the config file and the database registry.
///
/// Returns:
/// - Linux: ~/.config/sampledex
/// - macOS: ~/Library/Application Support/sampledex
/// - Windows: %APPDATA%\sampledex
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sampledex")
}

/// Get the config file path.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Sampledex Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (SAMPLEDEX_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Sample database directory used when no database has been selected with
# `sampledex db use` and no --db flag is given.
#
# Can also be set via:
# - CLI: sampledex --db /custom/sample_db search "dusty snare"
# - Environment: SAMPLEDEX_DATABASE_PATH=/custom/sample_db
#database_path = "./sample_db"

# Files longer than this (in seconds) are skipped when indexing.
max_duration_secs = 10.0

# Metadata updates written per transaction during reanalysis.
batch_size = 50

[embedding]
# Local service hosting the audio/text embedding model.
endpoint = "http://127.0.0.1:8765"
model = "laion/larger_clap_music_and_speech"
timeout_secs = 60

[external]
# External analysis program, run once per file with the audio path as
# its last argument. It must print a JSON object such as
#   {"bpm": 124.0, "key": "A min", "strength": 0.81}
#program = "sampledex-keytempo"
#args = []

[remote]
# Command that enters the secondary environment for `remote-analyze`.
launcher = "wsl"
# Conda environment prefix (tried first) and name (fallback).
#env_path = "D:\\envs\\sampledex"
env_name = "env_wsl"
# The sampledex binary inside the secondary environment.
program = "sampledex"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
