use thiserror::Error;

/// Error type for assembling a handshake driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("invalid plugin id: {0:?}")]
    InvalidPluginId(String),
}

/// Result type alias for printauth-handshake operations.
pub type HandshakeResult<T> = Result<T, HandshakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            HandshakeError::MissingCollaborator("transport").to_string(),
            "missing collaborator: transport"
        );
        assert_eq!(
            HandshakeError::InvalidPluginId("bad id".into()).to_string(),
            "invalid plugin id: \"bad id\""
        );
    }
}
