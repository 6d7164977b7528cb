//! OpenAI Embeddings API provider.

use async_trait::async_trait;
use chunkdb_core::traits::Embedder;
use chunkdb_core::types::Vector;
use chunkdb_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, dimensions: usize) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("OpenAI API key is empty".into()));
        }
        if dimensions == 0 {
            return Err(Error::InvalidConfig("embedding dimensions must be positive".into()));
        }
        Ok(Self { client: Client::new(), api_key, base_url: DEFAULT_BASE_URL.to_string(), model, dimensions })
    }

    /// Point at an OpenAI-compatible endpoint instead of the public API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn native_dimensions(model: &str) -> Option<usize> {
        match model {
            "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }

    fn requested_dimensions(&self) -> Option<usize> {
        match Self::native_dimensions(&self.model) {
            Some(native) if native == self.dimensions => None,
            _ => Some(self.dimensions),
        }
    }
}

/// Reorder response rows by `index` and check count and dimension.
fn into_vectors(mut data: Vec<EmbeddingData>, expected: usize, dim: usize) -> Result<Vec<Vector>> {
    if data.len() != expected {
        return Err(Error::EmbeddingProvider(format!("expected {expected} embeddings, got {}", data.len())));
    }
    data.sort_by_key(|d| d.index);
    data.into_iter()
        .map(|d| {
            if d.embedding.len() == dim {
                Ok(d.embedding)
            } else {
                Err(Error::EmbeddingProvider(format!("expected dimension {dim}, got {}", d.embedding.len())))
            }
        })
        .collect()
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str { &self.model }

    fn dim(&self) -> usize { self.dimensions }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest { model: &self.model, input: texts, dimensions: self.requested_dimensions() };

        let http_response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("request failed: {e}")))?;

        let status = http_response.status();
        let body = http_response.text().await.map_err(|e| Error::embedding(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(Error::embedding(format!("status {status}: {body}")));
        }

        let response: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|e| Error::embedding(format!("failed to parse response: {e}")))?;
        debug!(model = %self.model, inputs = texts.len(), "embedded batch");
        into_vectors(response.data, texts.len(), self.dimensions)
    }
}
