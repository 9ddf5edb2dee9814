//! Domain error types.

/// Top-level error type for pricecast.
#[derive(Debug, thiserror::Error)]
pub enum PricecastError {
    #[error("source {source_name} unavailable: {path}")]
    SourceUnavailable { source_name: String, path: String },

    #[error("malformed {source_name} source: {reason}")]
    SourceMalformed { source_name: String, reason: String },

    #[error("{source_name} source is missing required column '{column}'")]
    SchemaMismatch { source_name: String, column: String },

    #[error("invalid merged frame: {reason}")]
    FrameInvalid { reason: String },

    #[error("model alignment error: {reason}")]
    ModelAlignment { reason: String },

    #[error("insufficient history for {stage}: have {have} rows, need {need}")]
    InsufficientHistory {
        stage: String,
        have: usize,
        need: usize,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("model store error: {reason}")]
    ModelStore { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PricecastError> for std::process::ExitCode {
    fn from(err: &PricecastError) -> Self {
        let code: u8 = match err {
            PricecastError::Io(_) => 1,
            PricecastError::ConfigParse { .. }
            | PricecastError::ConfigMissing { .. }
            | PricecastError::ConfigInvalid { .. } => 2,
            PricecastError::SourceUnavailable { .. }
            | PricecastError::SourceMalformed { .. }
            | PricecastError::SchemaMismatch { .. }
            | PricecastError::FrameInvalid { .. } => 3,
            PricecastError::ModelAlignment { .. } | PricecastError::ModelStore { .. } => 4,
            PricecastError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
