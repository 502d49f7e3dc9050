use thiserror::Error;

/// Failure to obtain a usable response from the authorization endpoint.
///
/// Distinct from a well-formed `success: false` response, which is a normal
/// result. Messages never include the requester identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("response does not match the {0} command")]
    UnexpectedResponse(&'static str),

    #[error("request could not be sent: {0}")]
    InvalidRequest(String),
}

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A material choice string that is neither "own" nor "paid".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("material choice must be 'own' or 'paid'")]
pub struct ParseChoiceError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
        assert_eq!(
            TransportError::Status(502).to_string(),
            "endpoint returned HTTP 502"
        );
        assert_eq!(
            TransportError::UnexpectedResponse("authenticate").to_string(),
            "response does not match the authenticate command"
        );
    }

    #[test]
    fn test_transport_error_clone_and_eq() {
        let e1 = TransportError::Connect("refused".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
        assert_ne!(e1, TransportError::Timeout);
    }

    #[test]
    fn test_parse_choice_error_display() {
        assert_eq!(
            ParseChoiceError.to_string(),
            "material choice must be 'own' or 'paid'"
        );
    }
}
