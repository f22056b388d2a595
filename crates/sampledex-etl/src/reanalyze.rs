//! Batch reanalysis of BPM and key for records already in a store.

use sampledex_core::model::{AnalysisEngine, SampleId, SampleMetadata, SampleRecord};
use sampledex_core::schema::SampleStore;
use serde::Serialize;

use crate::analysis::Analyzer;
use crate::error::Result;
use crate::index::ProgressFn;

#[derive(Debug, Clone, Copy)]
pub struct ReanalyzeOptions {
    /// Reanalyze every record, not just incomplete ones.
    pub force: bool,
    /// Metadata updates written per transaction.
    pub batch_size: usize,
}

impl Default for ReanalyzeOptions {
    fn default() -> Self {
        Self {
            force: false,
            batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReanalyzeReport {
    pub selected: usize,
    pub updated: usize,
    pub failed: usize,
    /// Analyzed without detecting anything and not forced.
    pub unchanged: usize,
}

/// Whether `record` should be reanalyzed by `engine`.
///
/// Incomplete records always qualify. The external engine also takes
/// over records last analyzed by the builtin heuristic.
pub fn needs_reanalysis(record: &SampleRecord, engine: AnalysisEngine, force: bool) -> bool {
    force
        || record.metadata.is_incomplete()
        || (engine == AnalysisEngine::External
            && record.metadata.analysis_engine == AnalysisEngine::Builtin)
}

fn flush(
    store: &SampleStore,
    pending: &mut Vec<(SampleId, SampleMetadata)>,
    report: &mut ReanalyzeReport,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    report.updated += store.update_metadata_batch(pending)?;
    log::info!("Saved {} updates", pending.len());
    pending.clear();
    Ok(())
}

/// Reanalyze the selected records of `store` with `analyzer`.
///
/// Only metadata is rewritten; embeddings are never touched. Failures on
/// individual files are logged and counted. In a forced pass a failed
/// record keeps its BPM and key but is still tagged with the engine.
pub fn reanalyze(
    store: &SampleStore,
    analyzer: &dyn Analyzer,
    options: ReanalyzeOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<ReanalyzeReport> {
    let engine = analyzer.engine();
    let selected: Vec<SampleRecord> = store
        .list()?
        .into_iter()
        .filter(|record| needs_reanalysis(record, engine, options.force))
        .collect();

    let total = selected.len();
    log::info!("Reanalyzing {} samples with the {} engine", total, engine);

    let mut report = ReanalyzeReport {
        selected: total,
        ..ReanalyzeReport::default()
    };
    let batch_size = options.batch_size.max(1);
    let mut pending = Vec::with_capacity(batch_size);

    for (i, record) in selected.into_iter().enumerate() {
        match analyzer.analyze(&record.path) {
            Ok(analysis) => {
                let mut metadata = record.metadata;
                if let Some(bpm) = analysis.bpm.filter(|bpm| *bpm > 0.0) {
                    metadata.bpm = Some(bpm);
                }
                if let Some(key) = analysis.key {
                    metadata.key = Some(key);
                }

                if analysis.is_empty() && !options.force {
                    report.unchanged += 1;
                } else {
                    metadata.analysis_engine = engine;
                    pending.push((record.id, metadata));
                }
            }
            Err(e) => {
                log::warn!("Error processing {}: {}", record.path.display(), e);
                report.failed += 1;
                // A forced pass tags every record with the engine that ran.
                if options.force {
                    let mut metadata = record.metadata;
                    metadata.analysis_engine = engine;
                    pending.push((record.id, metadata));
                }
            }
        }

        if pending.len() >= batch_size {
            flush(store, &mut pending, &mut report)?;
        }
        if let Some(progress) = progress {
            progress(i + 1, total);
        }
    }
    flush(store, &mut pending, &mut report)?;

    log::info!(
        "Reanalysis complete: {} updated, {} unchanged, {} failed",
        report.updated,
        report.unchanged,
        report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analysis;
    use crate::error::Error;
    use sampledex_core::model::{Mode, MusicalKey, PitchClass};
    use std::path::{Path, PathBuf};

    /// Detects a fixed BPM and key for every file except `fail.wav`.
    struct FixedAnalyzer {
        engine: AnalysisEngine,
        analysis: Analysis,
    }

    impl Analyzer for FixedAnalyzer {
        fn engine(&self) -> AnalysisEngine {
            self.engine
        }

        fn analyze(&self, path: &Path) -> Result<Analysis> {
            if path.ends_with("fail.wav") {
                return Err(Error::Analysis {
                    path: path.to_path_buf(),
                    message: "boom".to_string(),
                });
            }
            Ok(self.analysis)
        }
    }

    fn a_minor() -> MusicalKey {
        MusicalKey::new(PitchClass::A, Mode::Minor)
    }

    fn insert(store: &SampleStore, name: &str, bpm: Option<f64>, engine: AnalysisEngine) {
        let mut record = SampleRecord::new(PathBuf::from(format!("/s/{name}")), vec![1.0, 0.0], engine);
        record.metadata.bpm = bpm;
        record.metadata.key = bpm.map(|_| a_minor());
        store.insert(&record).unwrap();
    }

    #[test]
    fn test_selection_rule() {
        let mut record = SampleRecord::new(PathBuf::from("/s/a.wav"), vec![1.0], AnalysisEngine::Builtin);
        assert!(needs_reanalysis(&record, AnalysisEngine::Builtin, false));

        record.metadata.bpm = Some(100.0);
        record.metadata.key = Some(a_minor());
        assert!(!needs_reanalysis(&record, AnalysisEngine::Builtin, false));
        assert!(needs_reanalysis(&record, AnalysisEngine::External, false));
        assert!(needs_reanalysis(&record, AnalysisEngine::Builtin, true));

        record.metadata.analysis_engine = AnalysisEngine::External;
        assert!(!needs_reanalysis(&record, AnalysisEngine::External, false));
    }

    #[test]
    fn test_fills_incomplete_records_only() {
        let store = SampleStore::open_in_memory().unwrap();
        insert(&store, "done.wav", Some(90.0), AnalysisEngine::Builtin);
        insert(&store, "todo.wav", None, AnalysisEngine::Builtin);

        let analyzer = FixedAnalyzer {
            engine: AnalysisEngine::Builtin,
            analysis: Analysis {
                bpm: Some(128.0),
                key: Some(MusicalKey::new(PitchClass::C, Mode::Major)),
            },
        };
        let report = reanalyze(&store, &analyzer, ReanalyzeOptions::default(), None).unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(report.updated, 1);

        let done = store.get(&SampleId::new("/s/done.wav")).unwrap();
        assert_eq!(done.metadata.bpm, Some(90.0));
        let todo = store.get(&SampleId::new("/s/todo.wav")).unwrap();
        assert_eq!(todo.metadata.bpm, Some(128.0));
        assert_eq!(todo.embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_nothing_detected_is_unchanged_unless_forced() {
        let store = SampleStore::open_in_memory().unwrap();
        insert(&store, "noise.wav", None, AnalysisEngine::Builtin);

        let analyzer = FixedAnalyzer {
            engine: AnalysisEngine::External,
            analysis: Analysis::default(),
        };
        let report = reanalyze(&store, &analyzer, ReanalyzeOptions::default(), None).unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.updated, 0);
        let record = store.get(&SampleId::new("/s/noise.wav")).unwrap();
        assert_eq!(record.metadata.analysis_engine, AnalysisEngine::Builtin);

        let forced = ReanalyzeOptions {
            force: true,
            ..ReanalyzeOptions::default()
        };
        let report = reanalyze(&store, &analyzer, forced, None).unwrap();
        assert_eq!(report.updated, 1);
        let record = store.get(&SampleId::new("/s/noise.wav")).unwrap();
        assert_eq!(record.metadata.analysis_engine, AnalysisEngine::External);
    }

    #[test]
    fn test_forced_pass_retags_unreadable_file() {
        let store = SampleStore::open_in_memory().unwrap();
        let record = SampleRecord::new(
            PathBuf::from("/mnt/z/gone/kick.wav"),
            vec![1.0, 0.0],
            AnalysisEngine::External,
        );
        store.insert(&record).unwrap();

        let options = ReanalyzeOptions {
            force: true,
            ..ReanalyzeOptions::default()
        };
        let analyzer = crate::analysis::BuiltinAnalyzer::new();
        let report = reanalyze(&store, &analyzer, options, None).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 1);

        let record = store.get(&record.id).unwrap();
        assert_eq!(record.metadata.analysis_engine, AnalysisEngine::Builtin);
        assert_eq!(record.embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_failure_without_force_is_not_written() {
        let store = SampleStore::open_in_memory().unwrap();
        insert(&store, "fail.wav", None, AnalysisEngine::Builtin);

        let analyzer = FixedAnalyzer {
            engine: AnalysisEngine::External,
            analysis: Analysis::default(),
        };
        let report = reanalyze(&store, &analyzer, ReanalyzeOptions::default(), None).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 0);
        let record = store.get(&SampleId::new("/s/fail.wav")).unwrap();
        assert_eq!(record.metadata.analysis_engine, AnalysisEngine::Builtin);
    }

    #[test]
    fn test_forced_pass_retags_every_record_in_batches() {
        let store = SampleStore::open_in_memory().unwrap();
        for i in 0..7 {
            insert(&store, &format!("s{i}.wav"), Some(100.0), AnalysisEngine::Builtin);
        }
        insert(&store, "fail.wav", Some(100.0), AnalysisEngine::Builtin);

        let analyzer = FixedAnalyzer {
            engine: AnalysisEngine::External,
            analysis: Analysis {
                bpm: Some(101.0),
                key: None,
            },
        };
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let progress = |_: usize, _: usize| {
            calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        };
        let options = ReanalyzeOptions {
            force: true,
            batch_size: 3,
        };
        let report = reanalyze(&store, &analyzer, options, Some(&progress)).unwrap();

        assert_eq!(report.selected, 8);
        assert_eq!(report.updated, 8);
        assert_eq!(report.failed, 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 8);

        for record in store.list().unwrap() {
            assert_eq!(record.metadata.analysis_engine, AnalysisEngine::External);
            if record.filename == "fail.wav" {
                assert_eq!(record.metadata.bpm, Some(100.0));
            } else {
                assert_eq!(record.metadata.bpm, Some(101.0));
                // Key from the earlier pass is kept when nothing new is found.
                assert_eq!(record.metadata.key, Some(a_minor()));
            }
        }
    }
}
