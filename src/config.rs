use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SummarizeError};

pub const DEFAULT_MODEL_ID: &str = "Falconsai/text_summarization";
/// Encoder input cap; 0 feeds the whole text to the model untruncated.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 0;

/// Loads `<root>/.env` and then `<root>/config/summarizer.env` into the
/// process environment, without overriding variables that are already set.
/// Returns the files that were found.
///
/// Runs before logging is set up so `RUST_LOG` can live in these files.
pub fn load_env_files(root: &Path) -> Vec<PathBuf> {
    [root.join(".env"), root.join("config").join("summarizer.env")]
        .into_iter()
        .filter(|path| dotenvy::from_path(path).is_ok())
        .collect()
}

/// Length and randomness knobs for one summarization call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingConfig {
    /// Upper bound on the decoder sequence, start token included.
    pub max_length: usize,
    /// Separate cap on generated tokens, start token excluded.
    pub max_new_tokens: Option<usize>,
    /// EOS is suppressed until the decoder sequence reaches this length.
    pub min_length: usize,
    pub do_sample: bool,
    pub temperature: f64,
    pub top_k: usize,
    pub seed: Option<u64>,
    pub repetition_penalty: f32,
    /// `None` defers to the model's own summarization parameters.
    pub no_repeat_ngram_size: Option<usize>,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            max_length: 230,
            max_new_tokens: None,
            min_length: 30,
            do_sample: false,
            temperature: 1.0,
            top_k: 50,
            seed: None,
            repetition_penalty: 1.0,
            no_repeat_ngram_size: None,
        }
    }
}

impl DecodingConfig {
    pub fn new(max_length: usize, min_length: usize, do_sample: bool) -> Self {
        Self {
            max_length,
            min_length,
            do_sample,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_length > self.max_length {
            return Err(SummarizeError::DecodingConfig(format!(
                "min_length ({}) > max_length ({})",
                self.min_length, self.max_length
            )));
        }
        if self.do_sample {
            if !self.temperature.is_finite() || self.temperature <= 0.0 {
                return Err(SummarizeError::DecodingConfig(format!(
                    "temperature must be positive when sampling, got {}",
                    self.temperature
                )));
            }
            if self.top_k == 0 {
                return Err(SummarizeError::DecodingConfig(
                    "top_k must be at least 1 when sampling".into(),
                ));
            }
        }
        if !self.repetition_penalty.is_finite() || self.repetition_penalty <= 0.0 {
            return Err(SummarizeError::DecodingConfig(format!(
                "repetition_penalty must be positive, got {}",
                self.repetition_penalty
            )));
        }
        Ok(())
    }
}

/// Where the model files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Hub {
        model_id: String,
        revision: Option<String>,
    },
    Local(PathBuf),
}

impl ModelSource {
    pub fn label(&self) -> String {
        match self {
            ModelSource::Hub { model_id, .. } => model_id.clone(),
            ModelSource::Local(dir) => dir.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: ModelSource,
    pub device: Option<String>,
    pub max_input_tokens: usize,
    pub decoding: DecodingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: ModelSource::Hub {
                model_id: DEFAULT_MODEL_ID.to_string(),
                revision: None,
            },
            device: None,
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            decoding: DecodingConfig::default(),
        }
    }
}

impl Settings {
    /// Reads `SUMMARIZER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source = match get("SUMMARIZER_MODEL_DIR") {
            Some(dir) => ModelSource::Local(PathBuf::from(dir.trim())),
            None => ModelSource::Hub {
                model_id: get("SUMMARIZER_MODEL_ID")
                    .map(|v| v.trim().to_string())
                    .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
                revision: get("SUMMARIZER_REVISION").map(|v| v.trim().to_string()),
            },
        };

        let defaults = DecodingConfig::default();
        let decoding = DecodingConfig {
            max_length: parse_var(&get, "SUMMARIZER_MAX_LENGTH")?.unwrap_or(defaults.max_length),
            min_length: parse_var(&get, "SUMMARIZER_MIN_LENGTH")?.unwrap_or(defaults.min_length),
            do_sample: parse_flag(&get, "SUMMARIZER_DO_SAMPLE")?.unwrap_or(defaults.do_sample),
            temperature: parse_var(&get, "SUMMARIZER_TEMPERATURE")?
                .unwrap_or(defaults.temperature),
            seed: parse_var(&get, "SUMMARIZER_SEED")?,
            max_new_tokens: parse_var(&get, "SUMMARIZER_MAX_NEW_TOKENS")?,
            ..defaults
        };

        Ok(Self {
            source,
            device: get("SUMMARIZER_DEVICE"),
            max_input_tokens: parse_var(&get, "SUMMARIZER_MAX_INPUT_TOKENS")?
                .unwrap_or(DEFAULT_MAX_INPUT_TOKENS),
            decoding,
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SummarizeError::InvalidSetting {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn parse_flag<G>(get: &G, key: &str) -> Result<Option<bool>>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(SummarizeError::InvalidSetting {
            key: key.to_string(),
            value: raw,
        }),
    }
}
