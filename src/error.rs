use thiserror::Error;

/// Errors surfaced by the scoring and training pipeline.
///
/// Configuration errors (missing artifact, unreadable allowlist, unknown
/// classifier selector, non-binary artifact) are fatal and abort the calling
/// operation. Per-item input problems (a malformed URL in a batch) are never
/// reported through this type; they degrade in place to an "unknown" domain
/// and a best-effort score.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model artifact not found at {0}")]
    MissingArtifact(String),

    #[error("failed to load model artifact from {path}: {reason}")]
    ArtifactLoad { path: String, reason: String },

    #[error("failed to read allowlist file {0}")]
    MissingAllowlist(String),

    #[error("unknown classifier '{0}'; use 'logreg' or 'rf'")]
    UnknownClassifier(String),

    #[error("expected a binary classifier with 2 probability columns, got {0}")]
    NonBinaryClassifier(usize),

    #[error("classifier exposes neither class probabilities nor a decision margin")]
    NoScoringOutput,

    #[error("CSV is missing required column '{0}'")]
    MissingColumn(String),

    #[error("no usable rows left after dropping invalid ones ({seen} seen, {dropped} dropped)")]
    EmptyDataset { seen: usize, dropped: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub fn invalid_input(msg: impl Into<String>) -> AppError {
    AppError::InvalidInput(msg.into())
}
