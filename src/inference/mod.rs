pub mod device;
pub mod logits;
pub mod t5;
pub mod text;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::info;

use crate::config::{DecodingConfig, Settings};
use crate::error::Result;
use crate::hub;
use t5::T5Service;

/// Raw output of one model run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub tokens: usize,
}

/// Anything that can turn text into a summary under a decoding config.
pub trait SummaryBackend: Send + Sync {
    fn generate(&self, text: &str, config: &DecodingConfig) -> Result<Generation>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryResult {
    pub summary_text: String,
    #[serde(skip)]
    pub generated_tokens: usize,
}

pub struct Summarizer<B = T5Service> {
    backend: B,
}

impl<B: SummaryBackend> Summarizer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validates `config`, then runs the backend once on `text`.
    ///
    /// Empty text goes to the backend like any other input; what comes back
    /// (or fails) is up to the model.
    pub fn summarize(&self, text: &str, config: &DecodingConfig) -> Result<SummaryResult> {
        config.validate()?;

        let out = self.backend.generate(text, config)?;
        Ok(SummaryResult {
            summary_text: out.text,
            generated_tokens: out.tokens,
        })
    }
}

static SHARED: OnceCell<Summarizer<T5Service>> = OnceCell::new();

impl Summarizer<T5Service> {
    /// Resolves, downloads and loads the model described by `settings`.
    pub fn load(settings: &Settings) -> Result<Self> {
        let files = hub::resolve(&settings.source)?;
        let device = device::build_device(settings.device.as_deref())?;
        let service = T5Service::load(&files, device, settings.max_input_tokens)?;
        Ok(Self::new(service))
    }

    /// Process-wide instance, loaded on first call. Later `settings` are ignored.
    pub fn shared(settings: &Settings) -> Result<&'static Self> {
        SHARED.get_or_try_init(|| {
            info!("loading {}", settings.source.label());
            Self::load(settings)
        })
    }
}
