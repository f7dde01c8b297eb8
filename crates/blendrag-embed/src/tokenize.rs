use anyhow::{anyhow, ensure, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Encodes a batch into `[B, T]` id and attention-mask tensors. Sequences are
/// truncated to `max_len` and right-padded with `pad_id` to the longest one.
pub fn tokenize_batch_on_device(tokenizer: &Tokenizer, texts: &[String], max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor)> {
    ensure!(!texts.is_empty(), "cannot tokenize an empty batch");
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut all_ids = Vec::with_capacity(rows.len() * width);
    let mut all_mask = Vec::with_capacity(rows.len() * width);
    for (mut ids, mut mask) in rows {
        let pad = width - ids.len();
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
        all_ids.extend(ids);
        all_mask.extend(mask);
    }
    let input_ids = Tensor::from_vec(all_ids, (texts.len(), width), device)?;
    let attention_mask = Tensor::from_vec(all_mask, (texts.len(), width), device)?;
    Ok((input_ids, attention_mask))
}
