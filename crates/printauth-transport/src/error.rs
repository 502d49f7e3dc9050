use thiserror::Error;

/// Error type for constructing a transport.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("missing endpoint url")]
    MissingEndpoint,

    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(String),

    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid api key header value")]
    InvalidApiKey,

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type alias for transport construction.
pub type BuildResult<T> = Result<T, BuildError>;
