//! Audio and text embeddings from a shared model.
//!
//! Audio embeddings are stored at index time; text embeddings are
//! computed per query. Both come from the same joint audio/text model so
//! they are directly comparable.

pub mod http;

use async_trait::async_trait;

use crate::audio::DecodedAudio;
use crate::error::Result;

pub use http::HttpEmbedder;

/// Sample rate the embedding model expects.
pub const EMBED_SAMPLE_RATE: u32 = 48_000;

/// Produces embeddings for audio clips and text queries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the model producing the vectors.
    fn model(&self) -> &str;

    async fn embed_audio(&self, audio: &DecodedAudio) -> Result<Vec<f32>>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}
