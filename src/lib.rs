pub mod article;
pub mod config;
pub mod error;
pub mod hub;
pub mod inference;

pub use config::{DecodingConfig, ModelSource, Settings};
pub use error::SummarizeError;
pub use inference::{Generation, SummaryBackend, SummaryResult, Summarizer};
