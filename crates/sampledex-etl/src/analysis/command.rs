use sampledex_core::model::{AnalysisEngine, MusicalKey};
use sampledex_core::paths::resolve_existing;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use super::{normalize_bpm, Analysis, Analyzer};
use crate::error::{Error, Result};

/// Key strengths at or below this are treated as "no key".
const MIN_KEY_STRENGTH: f64 = 0.5;

/// What the external program prints on stdout.
#[derive(Debug, Deserialize)]
struct ExternalOutput {
    bpm: Option<f64>,
    key: Option<String>,
    strength: Option<f64>,
}

/// Runs an external analysis program once per file.
///
/// The program receives the audio path as its last argument and prints a
/// JSON object such as `{"bpm": 124.0, "key": "A min", "strength": 0.8}`.
/// Log lines before the JSON are tolerated; the last line starting with
/// `{` is parsed.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn parse_output(path: &Path, stdout: &str) -> Result<Analysis> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .ok_or_else(|| Error::Analysis {
                path: path.to_path_buf(),
                message: "no JSON object in program output".to_string(),
            })?;

        let output: ExternalOutput = serde_json::from_str(line).map_err(|e| Error::Analysis {
            path: path.to_path_buf(),
            message: format!("unparseable program output: {e}"),
        })?;

        let bpm = output.bpm.and_then(normalize_bpm);

        let confident = output.strength.map_or(true, |s| s > MIN_KEY_STRENGTH);
        let key = match output.key.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() && confident => match text.parse::<MusicalKey>() {
                Ok(key) => Some(key),
                Err(e) => {
                    log::warn!("Ignoring key reported for {}: {}", path.display(), e);
                    None
                }
            },
            _ => None,
        };

        Ok(Analysis { bpm, key })
    }
}

impl Analyzer for CommandAnalyzer {
    fn engine(&self) -> AnalysisEngine {
        AnalysisEngine::External
    }

    fn analyze(&self, path: &Path) -> Result<Analysis> {
        let Some(resolved) = resolve_existing(path) else {
            log::warn!("File not found, skipping: {}", path.display());
            return Ok(Analysis::default());
        };

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&resolved)
            .output()
            .map_err(|e| Error::Analysis {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {e}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Analysis {
                path: path.to_path_buf(),
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }

        Self::parse_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}
