use std::fs;
use std::path::Path;
use std::sync::Mutex;

use candle::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use candle_transformers::utils::apply_repeat_penalty;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::DecodingConfig;
use crate::error::{Result, SummarizeError};
use crate::hub::ModelFiles;
use crate::inference::logits::{banned_ngram_tokens, enforce_min_length, sampler_for, suppress_tokens};
use crate::inference::text::clean_decoded_text;
use crate::inference::{Generation, SummaryBackend};

/// `task_specific_params.summarization` from the checkpoint's config.json.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SummarizationDefaults {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub no_repeat_ngram_size: Option<usize>,
    #[serde(default)]
    pub num_beams: Option<usize>,
    #[serde(default)]
    pub length_penalty: Option<f64>,
}

#[derive(Deserialize)]
struct TaskParams {
    #[serde(default)]
    task_specific_params: Option<TaskSpecific>,
}

#[derive(Deserialize)]
struct TaskSpecific {
    #[serde(default)]
    summarization: Option<SummarizationDefaults>,
}

impl SummarizationDefaults {
    pub fn from_config_json(raw: &[u8]) -> Self {
        serde_json::from_slice::<TaskParams>(raw)
            .ok()
            .and_then(|p| p.task_specific_params)
            .and_then(|t| t.summarization)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------
// T5 encoder/decoder summarizer
// ---------------------------------------------------------
pub struct T5Service {
    model: Mutex<T5ForConditionalGeneration>,
    pub tokenizer: Tokenizer,
    pub device: Device,
    pub config: T5Config,
    pub task: SummarizationDefaults,
    max_input_tokens: usize,
}

impl T5Service {
    pub fn load(files: &ModelFiles, device: Device, max_input_tokens: usize) -> Result<Self> {
        let unavailable = |reason: String| SummarizeError::unavailable(&files.model_id, reason);

        info!("🔌 T5 → {device:?}");

        // ---- Config ----
        let raw = fs::read(&files.config)
            .map_err(|e| unavailable(format!("failed to read {}: {e}", files.config.display())))?;
        let mut config: T5Config = serde_json::from_slice(&raw)
            .map_err(|e| unavailable(format!("failed to parse {}: {e}", files.config.display())))?;
        config.use_cache = true;
        let task = SummarizationDefaults::from_config_json(&raw);
        if task.num_beams.is_some() || task.length_penalty.is_some() {
            debug!(
                "ignoring beam search defaults (num_beams={:?}, length_penalty={:?})",
                task.num_beams, task.length_penalty
            );
        }

        // ---- Tokenizer ----
        let mut tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(|e| {
            unavailable(format!(
                "tokenizer load failed ({}): {e}",
                files.tokenizer.display()
            ))
        })?;
        prepare_tokenizer(&mut tokenizer)
            .map_err(|e| unavailable(format!("tokenizer setup failed: {e}")))?;

        // ---- Weights ----
        let vb = build_var_builder(&files.weights, DType::F32, &device)
            .map_err(|e| unavailable(format!("failed to load {}: {e}", files.weights.display())))?;
        let model = T5ForConditionalGeneration::load(vb, &config)
            .map_err(|e| unavailable(format!("failed to build T5 model: {e}")))?;

        info!("🚀 {} loaded ({} layers)", files.model_id, config.num_layers);

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            config,
            task,
            max_input_tokens,
        })
    }

    fn eos_id(&self) -> u32 {
        self.config.eos_token_id as u32
    }

    fn decoder_start_id(&self) -> u32 {
        self.config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32
    }

    fn encode_input(&self, text: &str) -> Result<Vec<u32>> {
        let input = match &self.task.prefix {
            Some(prefix) => format!("{prefix}{text}"),
            None => text.to_string(),
        };

        let enc = self
            .tokenizer
            .encode(input, true)
            .map_err(|e| SummarizeError::Invocation(format!("tokenizer encode error: {e}")))?;

        // empty text still encodes to the prefix plus EOS
        let ids = truncate_input(enc.get_ids().to_vec(), self.max_input_tokens, self.eos_id());
        if ids.is_empty() {
            return Err(SummarizeError::Invocation("input encodes to no tokens".into()));
        }
        Ok(ids)
    }

    // -----------------------------------------------------------------
    // Generation: encode once, then one decoder step per token
    // -----------------------------------------------------------------
    pub fn generate_summary(&self, text: &str, cfg: &DecodingConfig) -> Result<Generation> {
        let input_ids = self.encode_input(text)?;
        debug!("encoded {} input tokens", input_ids.len());

        let mut model = self
            .model
            .lock()
            .map_err(|_| SummarizeError::Invocation("model lock poisoned".into()))?;
        model.clear_kv_cache();

        let input = Tensor::new(input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input)?;

        let ngram = cfg
            .no_repeat_ngram_size
            .or(self.task.no_repeat_ngram_size)
            .unwrap_or(0);
        let device = &self.device;
        let generated = run_decoder(
            |ids| {
                let step = Tensor::new(ids, device)?.unsqueeze(0)?;
                model
                    .decode(&step, &encoder_output)?
                    .squeeze(0)?
                    .to_dtype(DType::F32)
            },
            self.decoder_start_id(),
            self.eos_id(),
            ngram,
            cfg,
        )?;

        let decoded = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| SummarizeError::Invocation(format!("tokenizer decode error: {e}")))?;

        info!("generated {} summary tokens", generated.len());

        Ok(Generation {
            text: clean_decoded_text(&decoded),
            tokens: generated.len(),
        })
    }
}

impl SummaryBackend for T5Service {
    fn generate(&self, text: &str, config: &DecodingConfig) -> Result<Generation> {
        self.generate_summary(text, config)
    }
}

/// Greedy or sampled decoding driven by `step`, which maps the decoder ids
/// fed this round to next-token logits. The first round feeds the start
/// token, later rounds only the newest token (the model keeps a KV cache).
///
/// Returns the generated ids without the start token and without EOS.
pub fn run_decoder<F>(
    mut step: F,
    start: u32,
    eos: u32,
    no_repeat_ngram_size: usize,
    cfg: &DecodingConfig,
) -> Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> candle::Result<Tensor>,
{
    let mut sampler = sampler_for(cfg);
    let mut seq = vec![start];

    while seq.len() < cfg.max_length
        && cfg.max_new_tokens.map_or(true, |cap| seq.len() - 1 < cap)
    {
        let ids = if seq.len() == 1 {
            &seq[..]
        } else {
            &seq[seq.len() - 1..]
        };
        let logits = step(ids)?;
        let logits = if cfg.repetition_penalty == 1.0 {
            logits
        } else {
            apply_repeat_penalty(&logits, cfg.repetition_penalty, &seq[1..])?
        };

        let mut scores = logits.to_vec1::<f32>()?;
        enforce_min_length(&mut scores, eos, seq.len(), cfg.min_length);
        suppress_tokens(&mut scores, banned_ngram_tokens(&seq, no_repeat_ngram_size));

        let scores = Tensor::new(scores.as_slice(), &Device::Cpu)?;
        let next = sampler.sample(&scores)?;
        if next == eos {
            break;
        }
        seq.push(next);
    }

    seq.remove(0);
    Ok(seq)
}

// ---------------------------------------------------------
// Helpers
// ---------------------------------------------------------

/// Batch size is 1 and length is the model's business: no padding, no truncation.
fn prepare_tokenizer(tokenizer: &mut Tokenizer) -> tokenizers::Result<()> {
    tokenizer.with_padding(None);
    tokenizer.with_truncation(None)?;
    Ok(())
}

/// Caps the encoder input at `max_len` ids, keeping the closing EOS.
pub fn truncate_input(mut ids: Vec<u32>, max_len: usize, eos: u32) -> Vec<u32> {
    if max_len == 0 || ids.len() <= max_len {
        return ids;
    }
    let ends_with_eos = ids.last() == Some(&eos);
    ids.truncate(max_len);
    if ends_with_eos {
        if let Some(last) = ids.last_mut() {
            *last = eos;
        }
    }
    ids
}

fn build_var_builder(
    path: &Path,
    dtype: DType,
    device: &Device,
) -> candle::Result<VarBuilder<'static>> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext == "safetensors" {
        let files = vec![path.to_path_buf()];
        unsafe { VarBuilder::from_mmaped_safetensors(&files, dtype, device) }
    } else {
        VarBuilder::from_pth(path, dtype, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALCONSAI_CONFIG: &str = r#"{
        "d_model": 512,
        "num_layers": 6,
        "eos_token_id": 1,
        "pad_token_id": 0,
        "decoder_start_token_id": 0,
        "task_specific_params": {
            "summarization": {
                "early_stopping": true,
                "length_penalty": 2.0,
                "max_length": 200,
                "min_length": 30,
                "no_repeat_ngram_size": 3,
                "num_beams": 4,
                "prefix": "summarize: "
            },
            "translation_en_to_de": { "prefix": "translate English to German: " }
        }
    }"#;

    #[test]
    fn reads_summarization_defaults() {
        let task = SummarizationDefaults::from_config_json(FALCONSAI_CONFIG.as_bytes());
        assert_eq!(task.prefix.as_deref(), Some("summarize: "));
        assert_eq!(task.no_repeat_ngram_size, Some(3));
        assert_eq!(task.num_beams, Some(4));
        assert_eq!(task.length_penalty, Some(2.0));
    }

    #[test]
    fn missing_task_params_give_empty_defaults() {
        let task = SummarizationDefaults::from_config_json(br#"{"d_model": 512}"#);
        assert_eq!(task, SummarizationDefaults::default());

        let task = SummarizationDefaults::from_config_json(b"not json");
        assert_eq!(task, SummarizationDefaults::default());
    }

    const EOS: u32 = 1;
    const START: u32 = 0;

    fn logits(values: &[f32]) -> candle::Result<Tensor> {
        Tensor::new(values, &Device::Cpu)
    }

    fn greedy(max_length: usize, min_length: usize) -> DecodingConfig {
        DecodingConfig::new(max_length, min_length, false)
    }

    #[test]
    fn decoder_stops_one_short_of_max_length() {
        // token 3 always wins, EOS never does
        let out = run_decoder(
            |_| logits(&[0.0, -1.0, 0.5, 4.0, 0.1]),
            START,
            EOS,
            0,
            &greedy(6, 0),
        )
        .unwrap();
        assert_eq!(out, vec![3; 5]);

        let out = run_decoder(|_| logits(&[0.0, -1.0, 4.0]), START, EOS, 0, &greedy(1, 0)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn decoder_refuses_eos_until_min_length() {
        let out = run_decoder(
            |_| logits(&[0.0, 9.0, 5.0, 1.0]),
            START,
            EOS,
            0,
            &greedy(50, 4),
        )
        .unwrap();
        // start + 3 tokens reaches min_length, then EOS wins
        assert_eq!(out, vec![2, 2, 2]);
    }

    #[test]
    fn decoder_without_min_length_ends_on_eos() {
        let out = run_decoder(|_| logits(&[0.0, 9.0, 5.0]), START, EOS, 0, &greedy(50, 0)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn max_new_tokens_caps_generation() {
        let mut cfg = greedy(230, 0);
        cfg.max_new_tokens = Some(3);
        let out = run_decoder(|_| logits(&[0.0, -1.0, 4.0]), START, EOS, 0, &cfg).unwrap();
        assert_eq!(out.len(), 3);

        // the tighter of the two bounds wins
        let mut cfg = greedy(3, 0);
        cfg.max_new_tokens = Some(250);
        let out = run_decoder(|_| logits(&[0.0, -1.0, 4.0]), START, EOS, 0, &cfg).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn decoder_feeds_start_then_newest_token() {
        let mut fed: Vec<Vec<u32>> = Vec::new();
        let mut next = 2u32;
        let out = run_decoder(
            |ids| {
                fed.push(ids.to_vec());
                let mut scores = vec![0.0f32; 8];
                scores[next as usize] = 5.0;
                next += 1;
                logits(&scores)
            },
            START,
            EOS,
            0,
            &greedy(4, 0),
        )
        .unwrap();

        assert_eq!(out, vec![2, 3, 4]);
        assert_eq!(fed, vec![vec![START], vec![2], vec![3]]);
    }

    #[test]
    fn ngram_ban_counts_the_start_token() {
        // preference order: 0, then 3, then 4
        let out = run_decoder(
            |_| logits(&[5.0, -9.0, 0.0, 4.0, 3.0]),
            START,
            EOS,
            2,
            &greedy(5, 0),
        )
        .unwrap();
        // [0] -> 0 is free; [0,0] bans 0 -> 3; [0,0,3] -> 0; [0,0,3,0] bans 0 and 3 -> 4
        assert_eq!(out, vec![0, 3, 0, 4]);
    }

    #[test]
    fn greedy_runs_are_identical() {
        let run = || {
            run_decoder(
                |ids| {
                    // next token depends only on the last one and never hits EOS
                    let last = *ids.last().unwrap() as usize;
                    let mut scores = vec![0.1f32; 7];
                    scores[2 + last % 5] = 2.0;
                    logits(&scores)
                },
                START,
                EOS,
                0,
                &greedy(20, 5),
            )
            .unwrap()
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.len(), 19);
    }

    #[test]
    fn step_errors_become_invocation_errors() {
        let err = run_decoder(
            |_| Err(candle::Error::Msg("decoder blew up".into())),
            START,
            EOS,
            0,
            &greedy(10, 0),
        )
        .unwrap_err();
        assert!(matches!(err, SummarizeError::Invocation(_)));
    }

    #[test]
    fn tokenizer_padding_and_truncation_are_cleared() {
        use std::str::FromStr;
        use tokenizers::{PaddingParams, TruncationParams};

        let json = r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": null,
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "<unk>": 0, "fuel": 1, "cell": 2 },
                "unk_token": "<unk>"
            }
        }"#;
        let mut tokenizer = Tokenizer::from_str(json).unwrap();
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: 2,
                ..Default::default()
            }))
            .unwrap();

        prepare_tokenizer(&mut tokenizer).unwrap();

        assert!(tokenizer.get_padding().is_none());
        assert!(tokenizer.get_truncation().is_none());
    }

    #[test]
    fn truncation_keeps_eos() {
        assert_eq!(truncate_input(vec![5, 6, 7, 8, 1], 3, 1), vec![5, 6, 1]);
        assert_eq!(truncate_input(vec![5, 6, 7, 8], 3, 1), vec![5, 6, 7]);
        assert_eq!(truncate_input(vec![5, 1], 3, 1), vec![5, 1]);
        assert_eq!(truncate_input(vec![5, 6, 1], 0, 1), vec![5, 6, 1]);
    }
}
