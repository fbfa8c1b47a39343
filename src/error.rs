use thiserror::Error;

/// Failures surfaced by the engine. Validation problems and rejected
/// concurrent moves are not errors: those return `Ok(None)` or `false`.
#[derive(Debug, Error)]
pub enum MailError {
    /// The remote mailbox service failed. Local state has already been
    /// restored by the time this is returned.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MailError>;
