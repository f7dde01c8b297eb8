use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Mean of the unmasked token states, L2-normalized per row: `[B,T,H] -> [B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    ensure!(dims.len() == 3, "hidden shape must be [B,T,H], got {:?}", dims);
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_broadcast = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
    let sum = (hidden * &mask_broadcast)?.sum(1)?;
    // all-padding rows would divide by zero
    let lengths = mask.sum(1)?.unsqueeze(1)?.maximum(1f64)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;

    let eps_val = match hidden.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(0)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    ensure!(pooled.dims() == [batch, hidden_dim], "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use super::masked_mean_l2;
    use candle_core::{DType, Device, Tensor};

    #[test]
    fn masked_tokens_do_not_contribute() {
        let dev = Device::Cpu;
        let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
        let mask = Tensor::from_slice(&[1u32, 0], (1, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
        let v: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
        let norm = 30f32.sqrt();
        for (a, b) in v[0].iter().zip([1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm]) {
            assert!((a - b).abs() < 1e-5, "a={a} b={b}");
        }
    }

    #[test]
    fn rows_are_pooled_independently() {
        let dev = Device::Cpu;
        let h = Tensor::from_slice(&[3.0f32, 0.0, 1.0, 1.0, 0.0, 2.0, 0.0, 4.0], (2, 2, 2), &dev).unwrap();
        let mask = Tensor::from_slice(&[1u32, 1, 1, 1], (2, 2), &dev).unwrap();
        let v: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();
        // row 0 mean [2, 0.5], row 1 mean [0, 3]
        let n0 = (4.0f32 + 0.25).sqrt();
        assert!((v[0][0] - 2.0 / n0).abs() < 1e-5);
        assert!((v[1][0]).abs() < 1e-6 && (v[1][1] - 1.0).abs() < 1e-5);
    }
}
