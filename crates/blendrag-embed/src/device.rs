use std::str::FromStr;

use anyhow::{bail, Result};
use candle_core::Device;
use tracing::info;

/// Compute device requested through `embedding.device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Metal when built with the `metal` feature and a GPU answers, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Metal,
}

impl FromStr for DevicePreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "metal" | "mps" => Ok(Self::Metal),
            other => bail!("unknown embedding device '{other}' (expected auto, cpu or metal)"),
        }
    }
}

/// An explicit `Metal` request fails when no Metal device can be opened.
pub fn select_device(preference: DevicePreference) -> Result<Device> {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Metal => match metal() {
            Some(dev) => dev,
            None => bail!("metal embedding device requested but unavailable"),
        },
        DevicePreference::Auto => metal().unwrap_or(Device::Cpu),
    };
    info!(device = if device.is_metal() { "metal" } else { "cpu" }, "embedding device selected");
    Ok(device)
}

#[cfg(feature = "metal")]
fn metal() -> Option<Device> {
    Device::new_metal(0).ok()
}

#[cfg(not(feature = "metal"))]
fn metal() -> Option<Device> {
    None
}
