use anyhow::Result;
use sampledex_etl::{Config, RemoteLauncher};
use std::path::Path;

pub async fn run_remote(db_path: &Path, force: bool, config: &Config) -> Result<()> {
    let launcher = RemoteLauncher::new(config.remote.clone());

    println!("Checking {} environment...", config.remote.launcher);
    launcher.preflight().await?;
    println!("  ✓ Environment ready\n");

    launcher
        .run(db_path, force, |line| println!("  {line}"))
        .await?;

    println!("\n✓ External analysis complete");
    println!("  Run 'sampledex status' to see the updated engine counts.");
    Ok(())
}
