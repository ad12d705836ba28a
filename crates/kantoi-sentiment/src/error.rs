use kantoi_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle returned status {status}: {message}")]
    Oracle { status: u16, message: String },

    #[error("oracle reply was empty")]
    EmptyReply,

    #[error("malformed oracle output: {0}")]
    MalformedOracleOutput(String),

    #[error("invalid source dump: {0}")]
    InvalidDump(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
