use regex::{Regex, RegexBuilder};
use sampledex_core::model::{AudioFormat, MusicalKey, SampleRecord};

pub const DEFAULT_MIN_BPM: f64 = 0.0;
pub const DEFAULT_MAX_BPM: f64 = 300.0;
pub const DEFAULT_MIN_DURATION: f64 = 0.0;
pub const DEFAULT_MAX_DURATION: f64 = 999.0;

/// Convert a squared L2 distance between unit vectors into a 0..=100
/// similarity percentage.
pub fn similarity_percent(distance: f32) -> f64 {
    ((1.0 - f64::from(distance) / 2.0) * 100.0).clamp(0.0, 100.0)
}

/// Colour band a similarity falls into when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimilarityBand {
    Excellent,
    Strong,
    Good,
    Fair,
    Weak,
    Poor,
}

impl SimilarityBand {
    pub fn from_percent(similarity: f64) -> Self {
        match similarity {
            s if s >= 85.0 => Self::Excellent,
            s if s >= 70.0 => Self::Strong,
            s if s >= 55.0 => Self::Good,
            s if s >= 40.0 => Self::Fair,
            s if s >= 25.0 => Self::Weak,
            _ => Self::Poor,
        }
    }
}

/// Post-query filters. The default passes everything.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilters {
    /// Case-insensitive regex the file name must match.
    pub include: Option<String>,
    /// Case-insensitive regex the file name must not match.
    pub exclude: Option<String>,
    pub min_similarity: f64,
    pub max_similarity: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub key: Option<MusicalKey>,
    pub format: Option<AudioFormat>,
    pub min_duration: f64,
    pub max_duration: f64,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            include: None,
            exclude: None,
            min_similarity: 0.0,
            max_similarity: 100.0,
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
            key: None,
            format: None,
            min_duration: DEFAULT_MIN_DURATION,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

fn compile_pattern(pattern: Option<&str>) -> Option<Regex> {
    let pattern = pattern.map(str::trim).filter(|p| !p.is_empty())?;
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::warn!("Ignoring invalid filter pattern {:?}: {}", pattern, e);
            None
        }
    }
}

impl SearchFilters {
    fn bpm_range_active(&self) -> bool {
        self.min_bpm > DEFAULT_MIN_BPM || self.max_bpm < DEFAULT_MAX_BPM
    }

    fn duration_range_active(&self) -> bool {
        self.min_duration > DEFAULT_MIN_DURATION || self.max_duration < DEFAULT_MAX_DURATION
    }

    /// Compile the name patterns once for a batch of candidates.
    pub fn compile(&self) -> CompiledFilters<'_> {
        CompiledFilters {
            filters: self,
            include: compile_pattern(self.include.as_deref()),
            exclude: compile_pattern(self.exclude.as_deref()),
        }
    }

    /// Human-readable summary of the active filters, empty when none are.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(include) = &self.include {
            parts.push(format!("include /{include}/"));
        }
        if let Some(exclude) = &self.exclude {
            parts.push(format!("exclude /{exclude}/"));
        }
        if self.min_similarity > 0.0 || self.max_similarity < 100.0 {
            parts.push(format!(
                "similarity {:.0}-{:.0}%",
                self.min_similarity, self.max_similarity
            ));
        }
        if self.bpm_range_active() {
            parts.push(format!("bpm {}-{}", self.min_bpm, self.max_bpm));
        }
        if let Some(key) = self.key {
            parts.push(format!("key {key}"));
        }
        if let Some(format) = self.format {
            parts.push(format!("format {format}"));
        }
        if self.duration_range_active() {
            parts.push(format!("duration {}-{}s", self.min_duration, self.max_duration));
        }
        parts.join(", ")
    }
}

/// [`SearchFilters`] with the name patterns compiled.
#[derive(Debug)]
pub struct CompiledFilters<'a> {
    filters: &'a SearchFilters,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl CompiledFilters<'_> {
    /// Whether `record`, found at `similarity` percent, passes every filter.
    pub fn matches(&self, record: &SampleRecord, similarity: f64) -> bool {
        let filters = self.filters;
        let metadata = &record.metadata;

        if let Some(include) = &self.include {
            if !include.is_match(&record.filename) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&record.filename) {
                return false;
            }
        }

        if similarity < filters.min_similarity || similarity > filters.max_similarity {
            return false;
        }

        // Samples without a detected tempo are not filtered by tempo.
        if filters.bpm_range_active() {
            if let Some(bpm) = metadata.bpm.filter(|bpm| *bpm > 0.0) {
                if bpm < filters.min_bpm || bpm > filters.max_bpm {
                    return false;
                }
            }
        }

        if let Some(key) = filters.key {
            if metadata.key != Some(key) {
                return false;
            }
        }

        if let Some(format) = filters.format {
            if metadata.format != Some(format) {
                return false;
            }
        }

        if filters.duration_range_active() {
            if let Some(duration) = metadata.duration_secs {
                if duration < filters.min_duration || duration > filters.max_duration {
                    return false;
                }
            }
        }

        true
    }
}
