pub mod decoder;
pub mod probe;

pub use decoder::{decode_audio, DecodedAudio};
pub use probe::{is_indexable, probe_duration};
