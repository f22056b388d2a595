use anyhow::Result;
use sampledex_core::paths::resolve_existing;
use sampledex_core::schema::SampleStore;
use sampledex_etl::{reanalyze, Analyzer, BuiltinAnalyzer, CommandAnalyzer, Config, ReanalyzeOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineArg {
    /// In-process tempo and key heuristics
    Builtin,
    /// The program configured under [external]
    External,
}

/// Accept a database path written in either path convention.
pub fn resolve_db_path(path: &Path) -> PathBuf {
    resolve_existing(path).unwrap_or_else(|| path.to_path_buf())
}

fn analyzer_for(engine: EngineArg, config: &Config) -> Result<Box<dyn Analyzer>> {
    match engine {
        EngineArg::Builtin => Ok(Box::new(BuiltinAnalyzer::new())),
        EngineArg::External => {
            let Some(program) = &config.external.program else {
                anyhow::bail!(
                    "No external analysis program configured.\n\n\
                     Set external.program in the config file, e.g.\n  \
                     sampledex config set external.program sampledex-keytempo\n\
                     or use 'sampledex remote-analyze' to run it in the secondary environment."
                );
            };
            Ok(Box::new(CommandAnalyzer::new(
                program.clone(),
                config.external.args.clone(),
            )))
        }
    }
}

pub fn run_reanalyze(
    db_path: &Path,
    engine: EngineArg,
    force: bool,
    batch_size: usize,
    config: &Config,
) -> Result<()> {
    log::info!("Starting reanalysis of {}", db_path.display());

    let store = SampleStore::open_existing(db_path)?;
    let analyzer = analyzer_for(engine, config)?;

    if force {
        log::info!("Force mode: reanalyzing all samples");
    }

    let progress = |done: usize, total: usize| {
        print!("\r[{done}/{total}] Analyzing...");
        if let Err(e) = std::io::stdout().flush() {
            log::debug!("Failed to flush progress: {}", e);
        }
    };

    let options = ReanalyzeOptions { force, batch_size };
    let report = reanalyze(&store, analyzer.as_ref(), options, Some(&progress))?;

    if report.selected == 0 {
        println!("No samples need reanalysis");
        return Ok(());
    }

    println!("\r"); // Clear progress line
    println!("\n✓ Reanalysis complete ({} engine)", analyzer.engine());
    println!("  Selected:  {}", report.selected);
    println!("  Updated:   {}", report.updated);
    println!("  Unchanged: {}", report.unchanged);
    println!("  Failed:    {}", report.failed);

    if report.failed > 0 {
        println!(
            "\nNote: {} files could not be analyzed. Check logs for details.",
            report.failed
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_external_without_program_is_an_error() {
        let config = Config::default();
        let err = analyzer_for(EngineArg::External, &config).err().unwrap();
        assert!(err.to_string().contains("external.program"));
    }

    #[test]
    fn test_external_with_program() {
        let mut config = Config::default();
        config.external.program = Some("keytempo".to_string());
        let analyzer = analyzer_for(EngineArg::External, &config).unwrap();
        assert_eq!(analyzer.engine().as_str(), "external");
    }

    #[test]
    fn test_resolve_db_path_keeps_existing() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(resolve_db_path(temp_dir.path()), temp_dir.path());
        assert_eq!(
            resolve_db_path(Path::new("/no/such/db")),
            PathBuf::from("/no/such/db")
        );
    }

    #[test]
    fn test_missing_database() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        let err = run_reanalyze(&missing, EngineArg::Builtin, false, 50, &Config::default())
            .unwrap_err();
        assert!(err.to_string().contains("no sample database"));
    }
}
