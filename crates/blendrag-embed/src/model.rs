use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, ensure, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, instrument, warn};

use blendrag_core::traits::Embedder;

use crate::device::{select_device, DevicePreference};
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch_on_device;

/// Sentence embedder over a local BERT-family checkpoint (MiniLM by default):
/// `tokenizer.json`, `config.json` and `model.safetensors` or `pytorch_model.bin`.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    #[instrument(skip_all, fields(model_dir = %model_dir.display()))]
    pub fn load(model_dir: &Path, max_len: usize, device: DevicePreference) -> Result<Self> {
        let device = select_device(device)?;
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.get_padding().map(|p| p.pad_id).or_else(|| tokenizer.token_to_id("[PAD]")).unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw)?;
        let shape: ModelShape = serde_json::from_str(&raw)?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;
        let max_len = max_len.min(shape.max_position_embeddings).max(1);
        info!(dim = shape.hidden_size, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim: shape.hidden_size, max_len, pad_id })
    }
}

#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
    max_position_embeddings: usize,
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let tensors = candle_core::pickle::read_all(&pickle)?;
        return tensors.into_iter().map(|(name, t)| Ok((name, t.to_device(device)?))).collect();
    }
    Err(anyhow!("no model weights found in {}", model_dir.display()))
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch_on_device(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec2()?;
        ensure!(out.len() == texts.len() && out.iter().all(|v| v.len() == self.dim), "embedding shape mismatch");
        let elapsed = start.elapsed().as_millis();
        if elapsed > 1_000 { warn!(batch = texts.len(), elapsed_ms = elapsed as u64, "slow embedding batch"); } else { debug!(batch = texts.len(), elapsed_ms = elapsed as u64, "embedded batch"); }
        Ok(out)
    }
}

/// `APP_MODEL_DIR` wins over the configured directory when it exists.
pub fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { return Ok(p); }
        warn!(dir = %p.display(), "APP_MODEL_DIR does not exist; falling back to config");
    }
    let p = blendrag_core::config::expand_path(configured);
    if p.exists() { return Ok(p); }
    Err(anyhow!("Could not locate embedding model directory {}", p.display()))
}
