//! BPM and key analysis.
//!
//! Two engines implement [`Analyzer`]: [`BuiltinAnalyzer`] runs a fast
//! in-process heuristic and is used while indexing; [`CommandAnalyzer`]
//! delegates to an external program and is used for reanalysis passes.

pub mod builtin;
pub mod command;
pub mod key;
pub mod tempo;

use sampledex_core::model::{AnalysisEngine, MusicalKey};
use std::path::Path;

use crate::error::Result;

pub use builtin::BuiltinAnalyzer;
pub use command::CommandAnalyzer;

/// What an analysis engine detected. `None` means "not detected".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Analysis {
    pub bpm: Option<f64>,
    pub key: Option<MusicalKey>,
}

impl Analysis {
    /// Whether anything at all was detected.
    pub fn is_empty(&self) -> bool {
        self.bpm.is_none() && self.key.is_none()
    }
}

/// BPM and key detection backend.
pub trait Analyzer: Send + Sync {
    /// The engine tag written to records this analyzer updates.
    fn engine(&self) -> AnalysisEngine;

    /// Analyze one audio file.
    fn analyze(&self, path: &Path) -> Result<Analysis>;
}

/// Fold a raw tempo estimate into the 40..=200 BPM range, preferring the
/// octave closest to 120 BPM, rounded to one decimal.
pub fn normalize_bpm(base: f64) -> Option<f64> {
    if !base.is_finite() || base <= 0.0 {
        return None;
    }

    let mut candidates = vec![base];
    if base < 80.0 {
        candidates.push(base * 2.0);
    }
    if base > 160.0 {
        candidates.push(base / 2.0);
    }

    candidates
        .into_iter()
        .filter(|bpm| (40.0..=200.0).contains(bpm))
        .min_by(|a, b| (a - 120.0).abs().total_cmp(&(b - 120.0).abs()))
        .map(|bpm| (bpm * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_in_range() {
        assert_eq!(normalize_bpm(120.0), Some(120.0));
        assert_eq!(normalize_bpm(95.26), Some(95.3));
        assert_eq!(normalize_bpm(160.0), Some(160.0));
    }

    #[test]
    fn test_normalize_doubles_slow_tempo() {
        assert_eq!(normalize_bpm(62.0), Some(124.0));
        assert_eq!(normalize_bpm(45.0), Some(90.0));
    }

    #[test]
    fn test_normalize_halves_fast_tempo() {
        assert_eq!(normalize_bpm(240.0), Some(120.0));
        assert_eq!(normalize_bpm(170.0), Some(85.0));
    }

    #[test]
    fn test_normalize_out_of_range() {
        assert_eq!(normalize_bpm(15.0), None);
        assert_eq!(normalize_bpm(500.0), None);
        assert_eq!(normalize_bpm(0.0), None);
        assert_eq!(normalize_bpm(-90.0), None);
        assert_eq!(normalize_bpm(f64::NAN), None);
    }

    #[test]
    fn test_analysis_is_empty() {
        assert!(Analysis::default().is_empty());
        let analysis = Analysis {
            bpm: Some(100.0),
            key: None,
        };
        assert!(!analysis.is_empty());
    }
}
