//! HTTP client for the authorization endpoint.
//!
//! Both commands are a single `POST` of the JSON-encoded [`Command`] to the
//! same URL. There are no retries: `confirm_material` records a purchase
//! choice on the host and must not be sent twice.

use std::time::Duration;

use async_trait::async_trait;
use printauth_core::{
    AuthorizationResult, AuthorizationTransport, Command, CommandResponse, ConfirmationResult,
    TransportError, TransportResult,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

use crate::error::{BuildError, BuildResult};

/// Header carrying the host API key on plugin endpoints (`X-Api-Key`).
pub const API_KEY_HEADER: &str = "x-api-key";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// HttpTransportBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpTransportBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: concat!("printauth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpTransportBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Total time allowed for one request, including reading the body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> BuildResult<HttpTransport> {
        let raw = self.endpoint.ok_or(BuildError::MissingEndpoint)?;
        let endpoint = parse_endpoint(&raw)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(key).map_err(|_| BuildError::InvalidApiKey)?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent)
            .default_headers(headers)
            .build()?;

        tracing::debug!(endpoint = %endpoint, "http transport ready");
        Ok(HttpTransport { client, endpoint })
    }
}

/// Parse an endpoint URL, accepting only `http` and `https`.
pub fn parse_endpoint(raw: &str) -> BuildResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| BuildError::InvalidEndpoint(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BuildError::UnsupportedScheme(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AuthorizationTransport for HttpTransport {
    async fn submit(&self, command: &Command) -> TransportResult<CommandResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(command)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                command = command.name(),
                status = status.as_u16(),
                "endpoint returned error status",
            );
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        decode_response(command, &body)
    }
}

/// Decode a response body into the result type of `command`.
pub fn decode_response(command: &Command, body: &[u8]) -> TransportResult<CommandResponse> {
    let decoded = match command {
        Command::Authenticate { .. } => {
            serde_json::from_slice::<AuthorizationResult>(body).map(CommandResponse::Authorization)
        }
        Command::ConfirmMaterial { .. } => {
            serde_json::from_slice::<ConfirmationResult>(body).map(CommandResponse::Confirmation)
        }
    };
    decoded.map_err(|e| TransportError::Decode(e.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Connect(err.to_string())
    }
}
