//! Sample preview playback.

use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use sampledex_core::paths::resolve_existing;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Plays one sample at a time on the default output device.
///
/// The device is opened on first use, so a machine without audio output can
/// still search.
#[derive(Default)]
pub struct Player {
    output: Option<(OutputStream, OutputStreamHandle)>,
    current: Option<(PathBuf, Sink)>,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("device_open", &self.output.is_some())
            .field("playing", &self.playing())
            .finish()
    }
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&OutputStreamHandle> {
        if self.output.is_none() {
            let output = OutputStream::try_default().context("Failed to open audio output")?;
            log::debug!("Audio output initialized");
            self.output = Some(output);
        }
        self.output
            .as_ref()
            .map(|(_, handle)| handle)
            .ok_or_else(|| anyhow::anyhow!("audio output unavailable"))
    }

    /// The sample currently playing, if any.
    pub fn playing(&self) -> Option<&Path> {
        self.current
            .as_ref()
            .filter(|(_, sink)| !sink.empty())
            .map(|(path, _)| path.as_path())
    }

    pub fn play(&mut self, path: &Path) -> Result<()> {
        self.stop();

        let resolved = resolve_existing(path)
            .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))?;
        let file = File::open(&resolved)
            .with_context(|| format!("Failed to open {}", resolved.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Failed to decode {}", resolved.display()))?;

        let sink = Sink::try_new(self.handle()?).context("Failed to create sink")?;
        sink.append(source);

        log::debug!("Playing {}", resolved.display());
        self.current = Some((path.to_path_buf(), sink));
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some((_, sink)) = self.current.take() {
            sink.stop();
        }
    }

    /// Stop `path` if it is playing, otherwise play it. Returns whether
    /// playback is now running.
    pub fn toggle(&mut self, path: &Path) -> Result<bool> {
        if self.playing() == Some(path) {
            self.stop();
            return Ok(false);
        }
        self.play(path)?;
        Ok(true)
    }
}
