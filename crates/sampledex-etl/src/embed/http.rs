use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Embedder;
use crate::audio::DecodedAudio;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

const MAX_RETRIES: usize = 3;

#[derive(Debug, Serialize)]
struct AudioRequest<'a> {
    model: &'a str,
    sample_rate: u32,
    /// Little-endian f32 PCM, base64 encoded.
    samples: String,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Client for the local embedding service.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    http: Client,
    endpoint: String,
    model: String,
}

impl HttpEmbedder {
    /// Create a client for the service described by `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sampledex/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn post_once<T: Serialize + Sync>(&self, route: &str, body: &T) -> Result<Vec<f32>> {
        let url = format!("{}/{route}", self.endpoint);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Embedding {
                status: Some(status.as_u16()),
                message: format!("{url} returned {status}: {}", message.trim()),
            });
        }

        let body: EmbeddingResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(Error::Embedding {
                status: None,
                message: format!("{url} returned an empty embedding"),
            });
        }
        Ok(body.embedding)
    }

    async fn post<T: Serialize + Sync>(&self, route: &str, body: &T) -> Result<Vec<f32>> {
        (|| async { self.post_once(route, body).await })
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .when(Error::is_transient)
            .notify(|err, dur| {
                log::warn!("Embedding request failed ({}), retrying in {:?}", err, dur);
            })
            .await
    }
}

/// Encode PCM samples as base64 little-endian f32.
pub(crate) fn encode_samples(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_audio(&self, audio: &DecodedAudio) -> Result<Vec<f32>> {
        let request = AudioRequest {
            model: &self.model,
            sample_rate: audio.sample_rate,
            samples: encode_samples(&audio.samples),
        };
        self.post("embed/audio", &request).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let request = TextRequest {
            model: &self.model,
            text,
        };
        self.post("embed/text", &request).await
    }
}
