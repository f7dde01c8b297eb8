//! Text embedders behind `blendrag_core::traits::Embedder`: a candle BERT
//! sentence model for real runs and a hashing fake for tests.

pub mod device;
pub mod fake;
pub mod model;
pub mod pool;
pub mod tokenize;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use blendrag_core::config::EmbeddingConfig;
use blendrag_core::traits::Embedder;

pub use device::DevicePreference;
pub use fake::FakeEmbedder;
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;

fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// The embedder selected by configuration; `APP_USE_FAKE_EMBEDDINGS=1` forces the fake.
pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.use_fake || fake_requested() {
        info!(dim = config.dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(config.dim)));
    }
    let dir = model::resolve_model_dir(&config.model_dir)?;
    let device: DevicePreference = config.device.parse()?;
    Ok(Arc::new(BertEmbedder::load(&dir, config.max_len, device)?))
}
