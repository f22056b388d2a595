use anyhow::Result;
use sampledex_etl::pipeline::PIPELINE_STATE_FILE;
use sampledex_etl::{
    advance_folder, build_index_pipeline, Config, HttpEmbedder, IndexOptions, SampleFolder,
};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

pub async fn run_index(sample_dir: PathBuf, db_path: PathBuf, config: &Config) -> Result<()> {
    tracing::info!("Starting index of {}", sample_dir.display());

    if !sample_dir.is_dir() {
        anyhow::bail!("Not a directory: {}", sample_dir.display());
    }
    let sample_dir = sample_dir.canonicalize()?;
    std::fs::create_dir_all(&db_path)?;

    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let options = IndexOptions {
        max_duration_secs: config.max_duration_secs,
    };

    let (workflow, report) = build_index_pipeline(db_path.clone(), embedder, options)?;

    let state_path = db_path.join(PIPELINE_STATE_FILE);
    let mut store = treadle::SqliteStateStore::open(&state_path).await?;

    let job = SampleFolder::new(&sample_dir);

    let mut events = workflow.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                treadle::WorkflowEvent::StageStarted { stage, .. } => {
                    println!("  ⏳ [{stage}] Starting...");
                }
                treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                    println!("  ✓ [{stage}] Complete");
                }
                treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                    eprintln!("  ✗ [{stage}] FAILED: {error}");
                }
                _ => {}
            }
        }
    });

    advance_folder(&workflow, &mut store, &job).await?;

    let report = report.lock().unwrap_or_else(PoisonError::into_inner).clone();

    println!("\n✓ Index complete");
    println!("  Database:         {}", db_path.display());
    println!("  Audio files:      {}", report.discovered);
    println!("  Indexed:          {}", report.indexed);
    println!("  Already indexed:  {}", report.skipped_existing);
    println!(
        "  Too long:         {} (over {}s)",
        report.skipped_too_long, config.max_duration_secs
    );
    println!("  Unreadable:       {}", report.skipped_unreadable);
    println!("  Failed:           {}", report.failed);

    if report.failed > 0 {
        println!(
            "\nNote: {} files failed to embed. Check that the embedding service at {} is running.",
            report.failed, config.embedding.endpoint
        );
    }

    Ok(())
}
