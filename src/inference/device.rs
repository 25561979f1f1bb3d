use candle::Device;
use tracing::warn;

use crate::error::{Result, SummarizeError};

/// Picks the device from a `SUMMARIZER_DEVICE` style preference.
pub fn build_device(preference: Option<&str>) -> Result<Device> {
    match preference.map(str::trim).filter(|s| !s.is_empty()) {
        Some(pref) => parse_device_preference(pref),
        None => Ok(default_device()),
    }
}

fn parse_device_preference(value: &str) -> Result<Device> {
    let lower = value.to_ascii_lowercase();
    if lower == "cpu" {
        Ok(Device::Cpu)
    } else if lower.starts_with("cuda") || lower.starts_with("gpu") {
        let ordinal = value
            .split(':')
            .nth(1)
            .and_then(|part| part.trim().parse::<usize>().ok())
            .unwrap_or(0);
        Device::new_cuda(ordinal).map_err(|err| {
            SummarizeError::InvalidSetting {
                key: "SUMMARIZER_DEVICE".into(),
                value: format!("{value} (CUDA init failed: {err})"),
            }
        })
    } else {
        warn!("unrecognized SUMMARIZER_DEVICE value '{value}', defaulting to auto");
        Ok(default_device())
    }
}

fn default_device() -> Device {
    if cfg!(feature = "cuda") && candle::utils::cuda_is_available() {
        match Device::new_cuda(0) {
            Ok(device) => return device,
            Err(err) => warn!("CUDA:0 unavailable ({err}), falling back to CPU"),
        }
    }
    Device::Cpu
}
