//! Constraints applied to next-token logits before the sampler sees them.

use std::collections::HashSet;

use candle_transformers::generation::{LogitsProcessor, Sampling};

use crate::config::DecodingConfig;

/// Argmax when sampling is off, seeded top-k sampling otherwise.
pub fn sampler_for(cfg: &DecodingConfig) -> LogitsProcessor {
    let seed = cfg.seed.unwrap_or_else(rand::random);
    let sampling = if cfg.do_sample {
        Sampling::TopK {
            k: cfg.top_k,
            temperature: cfg.temperature,
        }
    } else {
        Sampling::ArgMax
    };
    LogitsProcessor::from_sampling(seed, sampling)
}

/// Masks every id in `ids` so it can never be chosen.
pub fn suppress_tokens(logits: &mut [f32], ids: impl IntoIterator<Item = u32>) {
    for id in ids {
        if let Some(slot) = logits.get_mut(id as usize) {
            *slot = f32::NEG_INFINITY;
        }
    }
}

/// Blocks end-of-sequence while the decoder sequence is shorter than `min_length`.
pub fn enforce_min_length(logits: &mut [f32], eos_id: u32, seq_len: usize, min_length: usize) {
    if seq_len < min_length {
        suppress_tokens(logits, [eos_id]);
    }
}

/// Tokens that would complete an n-gram already present in `seq`.
pub fn banned_ngram_tokens(seq: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || seq.len() + 1 < n {
        return Vec::new();
    }

    let prefix = &seq[seq.len() + 1 - n..];
    let mut banned = HashSet::new();
    for window in seq.windows(n) {
        if &window[..n - 1] == prefix {
            banned.insert(window[n - 1]);
        }
    }

    let mut banned: Vec<u32> = banned.into_iter().collect();
    banned.sort_unstable();
    banned
}
