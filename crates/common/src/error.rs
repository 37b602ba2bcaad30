use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid symbol '{0}': expected six currency letters plus optional broker suffix")]
    InvalidSymbol(String),

    #[error("Not enough bars for {symbol}: needed {needed}, got {got}")]
    InsufficientBars {
        symbol: String,
        needed: usize,
        got: usize,
    },

    #[error("Malformed bar #{index} for {symbol}")]
    MalformedBar { symbol: String, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
