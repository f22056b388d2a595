//! Indexing, analysis and embedding stages for sampledex.
//!
//! Walks sample folders into a [`sampledex_core::schema::SampleStore`],
//! derives BPM and key with an in-process or external analyzer, and talks
//! to the embedding service that turns audio and text into comparable
//! vectors. Indexing runs as a treadle `Stage`.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod analysis;
pub mod audio;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod reanalyze;
pub mod registry;
pub mod remote;
pub mod work_item;

pub use analysis::{Analysis, Analyzer, BuiltinAnalyzer, CommandAnalyzer};
pub use config::Config;
pub use embed::{Embedder, HttpEmbedder};
pub use error::{Error, Result};
pub use index::{IndexOptions, IndexReport, IndexStage, Indexer};
pub use pipeline::{advance_folder, build_index_pipeline};
pub use reanalyze::{reanalyze, ReanalyzeOptions, ReanalyzeReport};
pub use registry::DatabaseRegistry;
pub use remote::RemoteLauncher;
pub use work_item::SampleFolder;
