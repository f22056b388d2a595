pub mod ids;
pub mod key;
pub mod sample;

pub use ids::SampleId;
pub use key::{Mode, MusicalKey, PitchClass};
pub use sample::{AnalysisEngine, AudioFormat, SampleMetadata, SampleRecord};
