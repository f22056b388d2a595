use sampledex_core::model::AnalysisEngine;
use std::path::Path;

use super::{key, normalize_bpm, tempo, Analysis, Analyzer};
use crate::audio::{decode_audio, DecodedAudio};
use crate::error::Result;

/// Sample rate audio is decoded at for analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;
/// Only the start of longer files is analyzed.
pub const MAX_ANALYSIS_SECS: f64 = 30.0;
/// Clips shorter than this get no BPM or key.
pub const MIN_ANALYSIS_SECS: f64 = 0.5;

/// In-process tempo and key heuristic.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinAnalyzer;

impl BuiltinAnalyzer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Analyze already-decoded audio.
    pub fn analyze_audio(&self, audio: &DecodedAudio) -> Analysis {
        if audio.duration_secs < MIN_ANALYSIS_SECS {
            log::debug!(
                "Clip too short for analysis ({:.2}s)",
                audio.duration_secs
            );
            return Analysis::default();
        }

        let bpm = tempo::estimate_tempo(&audio.samples, audio.sample_rate).and_then(normalize_bpm);
        let key = key::detect_key(&audio.samples, audio.sample_rate);

        Analysis { bpm, key }
    }
}

impl Analyzer for BuiltinAnalyzer {
    fn engine(&self) -> AnalysisEngine {
        AnalysisEngine::Builtin
    }

    fn analyze(&self, path: &Path) -> Result<Analysis> {
        let audio = decode_audio(path, ANALYSIS_SAMPLE_RATE, MAX_ANALYSIS_SECS)?;
        let analysis = self.analyze_audio(&audio);
        log::debug!(
            "Analyzed {}: bpm={:?} key={:?}",
            path.display(),
            analysis.bpm,
            analysis.key.map(|k| k.to_string())
        );
        Ok(analysis)
    }
}
