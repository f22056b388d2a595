//! The list of known sample databases and which one was used last.
//!
//! Persisted as `databases.toml` next to the config file:
//!
//! ```toml
//! databases = ["./sample_db", "D:\\Libraries\\drums_db"]
//! last_used = "D:\\Libraries\\drums_db"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{config_dir, default_db_path};

/// File name of the registry inside the config directory.
pub const REGISTRY_FILE: &str = "databases.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRegistry {
    pub databases: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<PathBuf>,
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self {
            databases: vec![default_db_path()],
            last_used: None,
        }
    }
}

impl DatabaseRegistry {
    /// Default registry location.
    pub fn default_path() -> PathBuf {
        config_dir().join(REGISTRY_FILE)
    }

    /// Load the registry from `path`, or the default registry if the file
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize registry")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Add a database. Returns `false` if it was already registered.
    pub fn add(&mut self, path: PathBuf) -> bool {
        if self.databases.contains(&path) {
            return false;
        }
        self.databases.push(path);
        true
    }

    /// Remove a database. Returns `false` if it was not registered.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.databases.len();
        self.databases.retain(|db| db != path);
        if self.last_used.as_deref() == Some(path) {
            self.last_used = None;
        }
        self.databases.len() != before
    }

    /// Mark a database as last used, registering it if needed.
    pub fn select(&mut self, path: PathBuf) {
        self.add(path.clone());
        self.last_used = Some(path);
    }

    /// The database to work on: `cli` if given, then the last used one,
    /// then `fallback`.
    pub fn resolve(&self, cli: Option<&Path>, fallback: &Path) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.last_used.clone())
            .unwrap_or_else(|| fallback.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_registry() {
        let registry = DatabaseRegistry::default();
        assert_eq!(registry.databases, vec![PathBuf::from("./sample_db")]);
        assert!(registry.last_used.is_none());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = DatabaseRegistry::default();
        assert!(registry.add(PathBuf::from("/libs/drums")));
        assert!(!registry.add(PathBuf::from("/libs/drums")));
        assert_eq!(registry.databases.len(), 2);
    }

    #[test]
    fn test_remove_clears_last_used() {
        let mut registry = DatabaseRegistry::default();
        registry.select(PathBuf::from("/libs/drums"));
        assert!(registry.remove(Path::new("/libs/drums")));
        assert!(registry.last_used.is_none());
        assert!(!registry.remove(Path::new("/libs/drums")));
    }

    #[test]
    fn test_resolve_priority() {
        let mut registry = DatabaseRegistry::default();
        let fallback = Path::new("./sample_db");
        assert_eq!(registry.resolve(None, fallback), PathBuf::from("./sample_db"));

        registry.select(PathBuf::from("/libs/keys"));
        assert_eq!(registry.resolve(None, fallback), PathBuf::from("/libs/keys"));
        assert_eq!(
            registry.resolve(Some(Path::new("/cli/db")), fallback),
            PathBuf::from("/cli/db")
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(REGISTRY_FILE);

        let mut registry = DatabaseRegistry::default();
        registry.select(PathBuf::from("/libs/fx"));
        registry.save_to(&path).unwrap();

        let loaded = DatabaseRegistry::load_from(&path).unwrap();
        assert_eq!(loaded, registry);
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = DatabaseRegistry::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(loaded, DatabaseRegistry::default());
    }
}
