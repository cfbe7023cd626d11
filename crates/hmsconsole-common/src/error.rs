use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon answered, but with `status: "error"`.
    #[error("{0}")]
    Daemon(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConsoleError {
    /// True for failures that never reached the daemon (network, decoding).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Serialization(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
