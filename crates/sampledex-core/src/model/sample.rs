use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;
use crate::model::ids::SampleId;
use crate::model::key::MusicalKey;

/// The container format of an indexable sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Aif,
    Aiff,
    Flac,
    Ogg,
    Opus,
    M4a,
    Aac,
}

impl AudioFormat {
    pub const ALL: [Self; 9] = [
        Self::Wav,
        Self::Mp3,
        Self::Aif,
        Self::Aiff,
        Self::Flac,
        Self::Ogg,
        Self::Opus,
        Self::M4a,
        Self::Aac,
    ];

    /// Detect format from a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            "aif" => Some(Self::Aif),
            "aiff" => Some(Self::Aiff),
            "flac" => Some(Self::Flac),
            "ogg" => Some(Self::Ogg),
            "opus" => Some(Self::Opus),
            "m4a" => Some(Self::M4a),
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Aif => "aif",
            Self::Aiff => "aiff",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::M4a => "m4a",
            Self::Aac => "aac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| Error::InvalidData(format!("unsupported audio format: {s:?}")))
    }
}

/// Which analysis engine produced a record's BPM and key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisEngine {
    /// Fast in-process heuristic.
    Builtin,
    /// Out-of-process analysis program, slower and more accurate.
    External,
}

impl AnalysisEngine {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::External => "external",
        }
    }
}

impl fmt::Display for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Databases written by the desktop tool carry the library names.
        match s.to_ascii_lowercase().as_str() {
            "builtin" | "librosa" => Ok(Self::Builtin),
            "external" | "essentia" => Ok(Self::External),
            _ => Err(Error::InvalidData(format!("unknown analysis engine: {s:?}"))),
        }
    }
}

/// The mutable part of a sample record.
///
/// Reanalysis rewrites this and nothing else; embeddings are fixed at
/// index time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Detected tempo. `None` when no tempo could be detected.
    pub bpm: Option<f64>,
    /// Detected key. `None` when no confident key was found.
    pub key: Option<MusicalKey>,
    /// Duration in seconds as read from container properties.
    pub duration_secs: Option<f64>,
    pub format: Option<AudioFormat>,
    pub analysis_engine: AnalysisEngine,
}

impl SampleMetadata {
    /// Whether the record still lacks a BPM or a key.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        !matches!(self.bpm, Some(bpm) if bpm > 0.0) || self.key.is_none()
    }
}

/// One indexed audio file in a sample database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: SampleId,

    /// Path to the audio file, in the convention it was indexed with.
    pub path: PathBuf,

    /// File name without directories.
    pub filename: String,

    /// Embedding produced by the audio model, L2-normalized.
    pub embedding: Vec<f32>,

    pub metadata: SampleMetadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SampleRecord {
    #[must_use]
    pub fn new(path: PathBuf, embedding: Vec<f32>, analysis_engine: AnalysisEngine) -> Self {
        let now = Utc::now();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: SampleId::from_path(&path),
            filename,
            embedding,
            metadata: SampleMetadata {
                bpm: None,
                key: None,
                duration_secs: None,
                format: AudioFormat::from_path(&path),
                analysis_engine,
            },
            path,
            created_at: now,
            updated_at: now,
        }
    }
}
