use anyhow::Result;
use sampledex_core::schema::SampleStore;
use sampledex_etl::DatabaseRegistry;
use std::path::{Path, PathBuf};

pub fn list() -> Result<()> {
    let registry = DatabaseRegistry::load()?;

    println!("Sample databases ({})", DatabaseRegistry::default_path().display());
    for db in &registry.databases {
        let marker = if registry.last_used.as_ref() == Some(db) { "*" } else { " " };
        let state = if SampleStore::exists(db) {
            match SampleStore::open_existing(db).and_then(|store| store.count()) {
                Ok(count) => format!("{count} samples"),
                Err(e) => format!("unreadable: {e}"),
            }
        } else {
            "not indexed yet".to_string()
        };
        println!("  {marker} {}  ({state})", db.display());
    }

    Ok(())
}

pub fn add(path: PathBuf) -> Result<()> {
    let mut registry = DatabaseRegistry::load()?;
    if registry.add(path.clone()) {
        registry.save()?;
        println!("✓ Added {}", path.display());
    } else {
        println!("Already registered: {}", path.display());
    }
    Ok(())
}

pub fn select(path: PathBuf) -> Result<()> {
    let mut registry = DatabaseRegistry::load()?;
    if !SampleStore::exists(&path) {
        log::warn!("{} has no sample database yet", path.display());
    }
    registry.select(path.clone());
    registry.save()?;
    println!("✓ Using {}", path.display());
    Ok(())
}

pub fn remove(path: &Path) -> Result<()> {
    let mut registry = DatabaseRegistry::load()?;
    if registry.remove(path) {
        registry.save()?;
        println!("✓ Removed {} (files left in place)", path.display());
    } else {
        anyhow::bail!("Not registered: {}", path.display());
    }
    Ok(())
}
