use lofty::file::AudioFile;
use sampledex_core::model::AudioFormat;
use std::path::Path;

/// Whether `path` has one of the indexable audio extensions.
pub fn is_indexable(path: &Path) -> bool {
    AudioFormat::from_path(path).is_some()
}

/// Duration from container properties, without decoding.
///
/// Returns `None` if the file cannot be read or reports no duration.
pub fn probe_duration(path: &Path) -> Option<f64> {
    match lofty::read_from_path(path) {
        Ok(tagged_file) => {
            let secs = tagged_file.properties().duration().as_secs_f64();
            (secs > 0.0).then_some(secs)
        }
        Err(e) => {
            log::debug!("Failed to read properties of {}: {}", path.display(), e);
            None
        }
    }
}
