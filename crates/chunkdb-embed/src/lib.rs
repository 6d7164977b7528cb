//! Embedding providers behind the [`chunkdb_core::traits::Embedder`] port.
//!
//! `APP_USE_FAKE_EMBEDDINGS=1` switches [`get_default_embedder`] to the
//! offline [`HashingEmbedder`] for deterministic output in tests and
//! development; otherwise the OpenAI provider is used with `OPENAI_API_KEY`.

pub mod hashing;
pub mod normalize;
pub mod openai;

use std::sync::Arc;

use chunkdb_core::config::EmbeddingConfig;
use chunkdb_core::traits::Embedder;
use chunkdb_core::{Error, Result};
use tracing::info;

pub use hashing::HashingEmbedder;
pub use normalize::l2_normalize;
pub use openai::OpenAiEmbedder;

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        info!(dim = config.dimensions, "using hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(config.dimensions)));
    }
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| Error::InvalidConfig("OPENAI_API_KEY is not set (or set APP_USE_FAKE_EMBEDDINGS=1)".into()))?;
    info!(model = %config.model, dim = config.dimensions, "using OpenAI embedder");
    Ok(Arc::new(OpenAiEmbedder::new(api_key, config.model.clone(), config.dimensions)?))
}
