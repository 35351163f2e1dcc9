use thiserror::Error;

#[derive(Error, Debug)]
pub enum LegalxError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("A request is already in flight")]
    Busy,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LegalxError {
    /// True for failures of the request or the response body, as opposed to
    /// local setup problems.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::BackendStatus { .. } | Self::StreamError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LegalxError>;
