use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The provider has no snapshot for this instrument right now (market
    /// closed, unknown symbol, empty response). Retried next cycle.
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
