use thiserror::Error;

/// Unified error type shared across Trellis crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("agent error: {0}")]
    Agent(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("redmine API error (HTTP {status}): {body}")]
    Redmine { status: u16, body: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a Redmine error from a response status and body.
    pub fn redmine(status: u16, body: impl Into<String>) -> Self {
        Self::Redmine {
            status,
            body: body.into(),
        }
    }
}
