use thiserror::Error;

/// Error type for the printauth binary, aggregating errors from the
/// workspace crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("handshake error: {0}")]
    Handshake(#[from] printauth_handshake::HandshakeError),

    #[error("transport error: {0}")]
    Transport(#[from] printauth_transport::BuildError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_error_config() {
        let err = RootError::Config("missing url".into());
        assert_eq!(err.to_string(), "configuration error: missing url");
    }

    #[test]
    fn test_root_error_from_handshake() {
        let err: RootError =
            printauth_handshake::HandshakeError::MissingCollaborator("transport").into();
        assert!(err.to_string().contains("missing collaborator: transport"));
    }

    #[test]
    fn test_root_error_from_transport() {
        let err: RootError = printauth_transport::BuildError::MissingEndpoint.into();
        assert_eq!(err.to_string(), "transport error: missing endpoint url");
    }

    #[test]
    fn test_root_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let root_err: RootError = json_err.into();
        assert!(matches!(root_err, RootError::Serialization(_)));
    }

    #[test]
    fn test_root_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let root_err: RootError = toml_err.into();
        assert!(matches!(root_err, RootError::Config(_)));
    }
}
