use anyhow::Result;
use sampledex_core::schema::SampleStore;
use sampledex_etl::index::EMBEDDING_MODEL_INFO;
use std::path::Path;

pub fn show_status(db_path: &Path) -> Result<()> {
    let store = SampleStore::open_existing(db_path)?;
    let stats = store.stats()?;

    println!("\n📊 Sampledex Status\n");
    println!("  Database: {}", db_path.display());
    if let Some(model) = store.info(EMBEDDING_MODEL_INFO)? {
        println!("  Embedding model: {}", model);
    }
    println!("  Samples: {}", stats.total);
    println!("  With BPM: {}", stats.with_bpm);
    println!("  With key: {}", stats.with_key);

    if !stats.by_engine.is_empty() {
        println!("\n  Analysis engine:");
        for (engine, count) in &stats.by_engine {
            println!("    {engine}: {count}");
        }
    }

    if stats.with_bpm < stats.total || stats.with_key < stats.total {
        println!("\n  Run `sampledex reanalyze` to fill in missing BPM or key values");
    }

    Ok(())
}
