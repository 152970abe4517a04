use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid rule pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("override file: {0}")]
    Io(#[from] std::io::Error),

    #[error("override file JSON: {0}")]
    Json(#[from] serde_json::Error),
}
