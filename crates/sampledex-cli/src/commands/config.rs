use anyhow::{Context, Result};
use sampledex_etl::{config, Config};
use toml_edit::{value, DocumentMut, Item, Table};

/// Keys accepted by `config get` and `config set`.
const VALID_KEYS: &[&str] = &[
    "database_path",
    "max_duration_secs",
    "batch_size",
    "embedding.endpoint",
    "embedding.model",
    "embedding.timeout_secs",
    "external.program",
    "remote.launcher",
    "remote.env_path",
    "remote.env_name",
    "remote.program",
];

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!("Unknown config key: {}\n\nValid keys: {}", key, VALID_KEYS.join(", "))
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("<not set>")
}

/// Show the current effective configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    for key in VALID_KEYS {
        println!("  {}: {}", key, lookup(&config, key)?);
    }

    println!("\nPriority: CLI args > ENV vars (SAMPLEDEX_*) > Config file > Defaults");

    Ok(())
}

fn lookup(config: &Config, key: &str) -> Result<String> {
    let text = match key {
        "database_path" => config.database_path.display().to_string(),
        "max_duration_secs" => config.max_duration_secs.to_string(),
        "batch_size" => config.batch_size.to_string(),
        "embedding.endpoint" => config.embedding.endpoint.clone(),
        "embedding.model" => config.embedding.model.clone(),
        "embedding.timeout_secs" => config.embedding.timeout_secs.to_string(),
        "external.program" => or_unset(config.external.program.as_deref()).to_string(),
        "remote.launcher" => config.remote.launcher.clone(),
        "remote.env_path" => or_unset(config.remote.env_path.as_deref()).to_string(),
        "remote.env_name" => config.remote.env_name.clone(),
        "remote.program" => config.remote.program.clone(),
        _ => return Err(unknown_key(key)),
    };
    Ok(text)
}

/// Get a specific config value.
pub fn get_config(key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        let config = Config::load()?;
        println!("{}", lookup(&config, &key)?);
    } else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'sampledex config init' to create it.");
        }
    }

    Ok(())
}

/// Typed TOML value for `key`.
fn parse_value(key: &str, raw: &str) -> Result<Item> {
    let item = match key {
        "max_duration_secs" => value(
            raw.parse::<f64>()
                .with_context(|| format!("{key} must be a number"))?,
        ),
        "batch_size" | "embedding.timeout_secs" => {
            let n = raw
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("{key} must be a positive integer"))?;
            value(n)
        }
        _ => value(raw),
    };
    Ok(item)
}

/// Set `key` (possibly dotted) to `raw` in the TOML document `contents`,
/// keeping comments and layout.
pub fn update_document(contents: &str, key: &str, raw: &str) -> Result<String> {
    if !VALID_KEYS.contains(&key) {
        return Err(unknown_key(key));
    }

    let mut doc: DocumentMut = contents.parse().context("Failed to parse config file")?;
    let item = parse_value(key, raw)?;

    match key.split_once('.') {
        Some((section, field)) => {
            let table = doc
                .entry(section)
                .or_insert(Item::Table(Table::new()))
                .as_table_mut()
                .ok_or_else(|| anyhow::anyhow!("[{section}] in the config file is not a table"))?;
            table[field] = item;
        }
        None => doc[key] = item,
    }

    Ok(doc.to_string())
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();

    // Ensure config file exists
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let updated = update_document(&contents, key, value)?;

    std::fs::write(&config_path, updated).context("Failed to write config file")?;

    println!("✓ Updated {} = {}", key, value);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() {
    println!("{}", config::config_file_path().display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure sampledex.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
