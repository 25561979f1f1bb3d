use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Model `{model_id}` is unavailable: {reason}")]
    ModelUnavailable { model_id: String, reason: String },

    #[error("Invalid decoding config: {0}")]
    DecodingConfig(String),

    #[error("Summarization failed: {0}")]
    Invocation(String),

    #[error("Invalid value for {key}: `{value}`")]
    InvalidSetting { key: String, value: String },
}

impl SummarizeError {
    pub fn unavailable(model_id: impl Into<String>, reason: impl ToString) -> Self {
        SummarizeError::ModelUnavailable {
            model_id: model_id.into(),
            reason: reason.to_string(),
        }
    }
}

// Anything candle raises after the weights are loaded is an inference failure.
impl From<candle::Error> for SummarizeError {
    fn from(error: candle::Error) -> Self {
        SummarizeError::Invocation(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SummarizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = SummarizeError::unavailable("org/model", "404 Not Found");
        assert_eq!(
            err.to_string(),
            "Model `org/model` is unavailable: 404 Not Found"
        );

        let err = SummarizeError::DecodingConfig("min_length (40) > max_length (20)".into());
        assert_eq!(
            err.to_string(),
            "Invalid decoding config: min_length (40) > max_length (20)"
        );

        let err = SummarizeError::InvalidSetting {
            key: "SUMMARIZER_SEED".into(),
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "Invalid value for SUMMARIZER_SEED: `abc`");
    }

    #[test]
    fn candle_errors_become_invocation_errors() {
        let err: SummarizeError = candle::Error::Msg("shape mismatch".into()).into();
        match err {
            SummarizeError::Invocation(msg) => assert!(msg.contains("shape mismatch")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
