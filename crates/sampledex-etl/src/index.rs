//! Walk a folder tree into a sample database.

use sampledex_core::model::{SampleId, SampleRecord};
use sampledex_core::schema::SampleStore;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use treadle::{Stage, StageContext, StageOutcome};
use walkdir::WalkDir;

use crate::analysis::{Analysis, Analyzer, BuiltinAnalyzer};
use crate::audio::{decode_audio, is_indexable, probe_duration};
use crate::embed::{Embedder, EMBED_SAMPLE_RATE};
use crate::error::Result;
use crate::work_item::SampleFolder;

/// Store-info key recording which model produced the stored embeddings.
pub const EMBEDDING_MODEL_INFO: &str = "embedding_model";

/// Progress callback: `(files processed, files discovered)`.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Files longer than this are skipped and never stored.
    pub max_duration_secs: f64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_duration_secs: 10.0,
        }
    }
}

/// What an indexing run did with each discovered file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub discovered: usize,
    pub skipped_existing: usize,
    pub skipped_too_long: usize,
    /// Files whose duration could not be determined.
    pub skipped_unreadable: usize,
    pub indexed: usize,
    /// Files that could not be decoded or embedded.
    pub failed: usize,
}

/// Indexable audio files under `dir`, sorted, as absolute paths.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let root = dir.canonicalize()?;
    let files = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_indexable(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    Ok(files)
}

/// Indexes folders into one sample database.
pub struct Indexer<'a> {
    store: &'a SampleStore,
    embedder: &'a dyn Embedder,
    analyzer: &'a dyn Analyzer,
    options: IndexOptions,
}

impl fmt::Debug for Indexer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Indexer")
            .field("store", &self.store.dir())
            .field("model", &self.embedder.model())
            .field("engine", &self.analyzer.engine())
            .field("options", &self.options)
            .finish()
    }
}

impl<'a> Indexer<'a> {
    pub fn new(
        store: &'a SampleStore,
        embedder: &'a dyn Embedder,
        analyzer: &'a dyn Analyzer,
        options: IndexOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            analyzer,
            options,
        }
    }

    /// Index every new, short-enough audio file under `dir`.
    ///
    /// Per-file decode and embedding failures are logged and counted;
    /// only store errors abort the run.
    pub async fn run(&self, dir: &Path, progress: Option<ProgressFn<'_>>) -> Result<IndexReport> {
        let files = discover(dir)?;
        let existing = self.store.ids()?;
        let total = files.len();

        log::info!("Found {} audio files under {}", total, dir.display());

        let mut report = IndexReport {
            discovered: total,
            ..IndexReport::default()
        };

        for (i, path) in files.iter().enumerate() {
            self.index_file(path, &existing, &mut report).await?;
            if let Some(progress) = progress {
                progress(i + 1, total);
            }
        }

        if report.indexed > 0 {
            self.store
                .set_info(EMBEDDING_MODEL_INFO, self.embedder.model())?;
        }

        log::info!(
            "Indexing complete: {} indexed, {} already present, {} too long, {} unreadable, {} failed",
            report.indexed,
            report.skipped_existing,
            report.skipped_too_long,
            report.skipped_unreadable,
            report.failed
        );

        Ok(report)
    }

    async fn index_file(
        &self,
        path: &Path,
        existing: &HashSet<SampleId>,
        report: &mut IndexReport,
    ) -> Result<()> {
        if existing.contains(&SampleId::from_path(path)) {
            report.skipped_existing += 1;
            return Ok(());
        }

        let Some(duration) = probe_duration(path) else {
            log::warn!("Could not read duration of {}, skipping", path.display());
            report.skipped_unreadable += 1;
            return Ok(());
        };
        if duration > self.options.max_duration_secs {
            log::debug!(
                "Skipping {} ({:.1}s > {:.1}s)",
                path.display(),
                duration,
                self.options.max_duration_secs
            );
            report.skipped_too_long += 1;
            return Ok(());
        }

        let audio = match decode_audio(path, EMBED_SAMPLE_RATE, self.options.max_duration_secs) {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("{}", e);
                report.failed += 1;
                return Ok(());
            }
        };

        let embedding = match self.embedder.embed_audio(&audio).await {
            Ok(embedding) => embedding,
            Err(e) => {
                log::warn!("Failed to embed {}: {}", path.display(), e);
                report.failed += 1;
                return Ok(());
            }
        };

        let analysis = self.analyzer.analyze(path).unwrap_or_else(|e| {
            log::warn!("Analysis failed, storing without BPM/key: {}", e);
            Analysis::default()
        });

        let mut record = SampleRecord::new(path.to_path_buf(), embedding, self.analyzer.engine());
        record.metadata.bpm = analysis.bpm;
        record.metadata.key = analysis.key;
        record.metadata.duration_secs = Some(duration);

        match self.store.insert(&record) {
            Ok(()) => {
                log::debug!("Indexed {}", path.display());
                report.indexed += 1;
            }
            Err(sampledex_core::Error::Duplicate(_)) => report.skipped_existing += 1,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// The index stage: walk the work item's folder into the sample database.
pub struct IndexStage {
    db_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    options: IndexOptions,
    report: Arc<Mutex<IndexReport>>,
}

impl fmt::Debug for IndexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexStage")
            .field("db_dir", &self.db_dir)
            .field("model", &self.embedder.model())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl IndexStage {
    #[must_use]
    pub fn new(db_dir: PathBuf, embedder: Arc<dyn Embedder>, options: IndexOptions) -> Self {
        Self {
            db_dir,
            embedder,
            options,
            report: Arc::new(Mutex::new(IndexReport::default())),
        }
    }

    /// Shared handle to the report of the most recent run.
    pub fn report_handle(&self) -> Arc<Mutex<IndexReport>> {
        Arc::clone(&self.report)
    }

    async fn index_folder(&self, folder: &Path) -> Result<IndexReport> {
        let store = SampleStore::create(&self.db_dir)?;
        let analyzer = BuiltinAnalyzer::new();
        let indexer = Indexer::new(&store, self.embedder.as_ref(), &analyzer, self.options);

        let step = 10;
        let progress = |done: usize, total: usize| {
            if done % step == 0 || done == total {
                log::info!("[{}/{}] {}%", done, total, done * 100 / total.max(1));
            }
        };
        indexer.run(folder, Some(&progress)).await
    }
}

#[async_trait::async_trait]
impl Stage for IndexStage {
    fn name(&self) -> &str {
        "index"
    }

    async fn execute(
        &self,
        item: &dyn treadle::WorkItem,
        _context: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        let Some(folder) = SampleFolder::path_from_id(item.id()) else {
            return Err(treadle::TreadleError::StageExecution(format!(
                "Not a sample folder work item: {}",
                item.id()
            )));
        };
        log::info!("Starting index of {}", folder.display());

        match self.index_folder(&folder).await {
            Ok(report) => {
                *self.report.lock().unwrap_or_else(PoisonError::into_inner) = report;
                Ok(StageOutcome::Complete)
            }
            Err(e) => Err(treadle::TreadleError::StageExecution(format!(
                "Index failed: {e}"
            ))),
        }
    }
}
