use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ParseChoiceError, TransportError, TransportResult};

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp() as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

// ---------------------------------------------------------------------------
// HandshakeId: correlates the log lines and decision of one handshake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandshakeId(String);

impl HandshakeId {
    /// Generate a random 128-bit identifier, URL-safe base64 encoded.
    pub fn generate() -> Self {
        use base64::Engine;
        use rand::RngCore;

        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandshakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AuthorizationRequest: a collected credential on its way to the endpoint
// ---------------------------------------------------------------------------

/// The identity the user typed into the credential prompt.
///
/// Only constructible from a non-blank credential, so holding one means the
/// "no credential" path has already been ruled out.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    requester_id: String,
}

impl AuthorizationRequest {
    /// Build a request from whatever the prompt returned.
    ///
    /// Returns `None` for an absent, empty or whitespace-only credential.
    pub fn from_credential(credential: Option<String>) -> Option<Self> {
        let credential = credential?;
        let trimmed = credential.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            requester_id: trimmed.to_string(),
        })
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }
}

// Requester identities are personal data; keep them out of debug output.
impl fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("requester_id", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MaterialOption: one purchasable material offered after authentication
// ---------------------------------------------------------------------------

/// A material the host sells for this tool.
///
/// Every field is untrusted display text and must be escaped before it is
/// rendered into markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialOption {
    #[serde(default = "default_material_label")]
    pub label: String,

    #[serde(default = "default_material_unit")]
    pub unit: String,

    #[serde(default = "default_material_cost")]
    pub cost: String,

    #[serde(
        rename = "purchase",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase_url: Option<String>,
}

fn default_material_label() -> String {
    "Unknown Material".to_string()
}

fn default_material_unit() -> String {
    "?".to_string()
}

fn default_material_cost() -> String {
    "?.??".to_string()
}

/// Placeholder href used when a material has no purchase link.
pub const NO_LINK: &str = "#";

impl MaterialOption {
    pub fn new(label: impl Into<String>, unit: impl Into<String>, cost: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            cost: cost.into(),
            purchase_url: None,
        }
    }

    pub fn with_purchase_url(mut self, url: impl Into<String>) -> Self {
        self.purchase_url = Some(url.into());
        self
    }

    /// Link target safe to place in an `href`: the purchase URL when it uses
    /// http or https, otherwise `#`.
    pub fn purchase_href(&self) -> &str {
        match self.purchase_url.as_deref().map(str::trim) {
            Some(url) if is_web_url(url) => url,
            _ => NO_LINK,
        }
    }

    /// Whether the purchase link should open in a new tab.
    pub fn opens_new_tab(&self) -> bool {
        self.purchase_href() != NO_LINK
    }
}

fn is_web_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

// ---------------------------------------------------------------------------
// AuthorizationResult: response to the `authenticate` command
// ---------------------------------------------------------------------------

/// Fallback text shown when a failed response carries no message.
pub const UNKNOWN_AUTH_ERROR: &str = "Unknown authentication error.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default)]
    pub materials: Vec<MaterialOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthorizationResult {
    /// A successful result greeting `first_name` with the given materials.
    pub fn granted(first_name: impl Into<String>, materials: Vec<MaterialOption>) -> Self {
        Self {
            success: true,
            first_name: Some(first_name.into()),
            last_name: None,
            materials,
            message: None,
        }
    }

    /// A failed result carrying the server's explanation.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            first_name: None,
            last_name: None,
            materials: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// Name to greet the user with: trimmed "first last", or "User".
    pub fn welcome_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        let full = format!("{first} {last}");
        let full = full.trim();
        if full.is_empty() {
            "User".to_string()
        } else {
            full.to_string()
        }
    }

    /// The server's failure text, defaulting when absent or blank.
    pub fn failure_message(&self) -> &str {
        match self.message.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => UNKNOWN_AUTH_ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// MaterialChoice: own material vs paid material
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialChoice {
    /// The user brings their own consumable.
    OwnMaterial,
    /// The user buys the consumable through the host.
    Paid,
}

impl MaterialChoice {
    pub fn as_wire(&self) -> &'static str {
        match self {
            MaterialChoice::OwnMaterial => "own_material",
            MaterialChoice::Paid => "paid",
        }
    }
}

impl fmt::Display for MaterialChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for MaterialChoice {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "own" | "own_material" => Ok(MaterialChoice::OwnMaterial),
            "paid" => Ok(MaterialChoice::Paid),
            _ => Err(ParseChoiceError),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfirmationResult: response to the `confirm_material` command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl ConfirmationResult {
    pub fn confirmed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command / CommandResponse: the two operations of the authorization endpoint
// ---------------------------------------------------------------------------

/// Request body posted to the authorization endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Authenticate { email: String },
    ConfirmMaterial { choice: MaterialChoice },
}

impl Command {
    pub fn authenticate(request: &AuthorizationRequest) -> Self {
        Command::Authenticate {
            email: request.requester_id().to_string(),
        }
    }

    pub fn confirm_material(choice: MaterialChoice) -> Self {
        Command::ConfirmMaterial { choice }
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Authenticate { .. } => "authenticate",
            Command::ConfirmMaterial { .. } => "confirm_material",
        }
    }

    /// Only `authenticate` may be safely re-sent.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Command::Authenticate { .. })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Authenticate { .. } => f
                .debug_struct("Authenticate")
                .field("email", &"<redacted>")
                .finish(),
            Command::ConfirmMaterial { choice } => f
                .debug_struct("ConfirmMaterial")
                .field("choice", choice)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    Authorization(AuthorizationResult),
    Confirmation(ConfirmationResult),
}

impl CommandResponse {
    pub fn into_authorization(self) -> TransportResult<AuthorizationResult> {
        match self {
            CommandResponse::Authorization(result) => Ok(result),
            CommandResponse::Confirmation(_) => {
                Err(TransportError::UnexpectedResponse("authenticate"))
            }
        }
    }

    pub fn into_confirmation(self) -> TransportResult<ConfirmationResult> {
        match self {
            CommandResponse::Confirmation(result) => Ok(result),
            CommandResponse::Authorization(_) => {
                Err(TransportError::UnexpectedResponse("confirm_material"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PluginMessage: inbound "authorization requested" signal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMessageData {
    #[serde(default)]
    pub prompt: bool,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A message pushed by the host to a plugin's front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMessage {
    pub plugin: String,
    #[serde(default)]
    pub data: PluginMessageData,
}

impl PluginMessage {
    /// The message the host sends when a print start must be authorized.
    pub fn prompt(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            data: PluginMessageData {
                prompt: true,
                extra: serde_json::Map::new(),
            },
        }
    }

    /// True when this message asks `plugin_id` to start a handshake.
    pub fn requests_authorization(&self, plugin_id: &str) -> bool {
        self.plugin == plugin_id && self.data.prompt
    }
}

// ---------------------------------------------------------------------------
// Notification: user-facing message rendered by the presentation sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Success,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorCategory: classification of a failed authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The endpoint could not log into the identity service, or its settings
    /// are incomplete.
    ConfigurationError,
    /// The endpoint could not reach the identity service.
    NetworkError,
    /// The requester is unknown or lacks the permission for this tool.
    PermissionError,
    /// Anything else; the raw message is shown.
    GenericAuthError,
}

impl ErrorCategory {
    /// Whether this failure requires the gated action to be actively canceled
    /// rather than merely left un-started.
    pub fn cancels_action(&self) -> bool {
        matches!(self, ErrorCategory::PermissionError)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::ConfigurationError => write!(f, "configuration"),
            ErrorCategory::NetworkError => write!(f, "network"),
            ErrorCategory::PermissionError => write!(f, "permission"),
            ErrorCategory::GenericAuthError => write!(f, "generic"),
        }
    }
}

// ---------------------------------------------------------------------------
// HandshakeDecision: terminal result delivered to the action gate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenialReason {
    /// The user declined to enter a credential.
    NoCredential,
    /// No response was obtained from the authorization endpoint.
    TransportFailure,
    /// The endpoint answered `success: false`.
    Rejected(ErrorCategory),
}

/// What the action gate must do with the gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateDisposition {
    Proceed,
    Block,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeDecision {
    Allowed {
        handshake_id: HandshakeId,
        decided_at: Timestamp,
        choice: MaterialChoice,
    },
    Denied {
        handshake_id: HandshakeId,
        decided_at: Timestamp,
        reason: DenialReason,
    },
}

impl HandshakeDecision {
    pub fn allowed(handshake_id: HandshakeId, choice: MaterialChoice) -> Self {
        HandshakeDecision::Allowed {
            handshake_id,
            decided_at: Timestamp::now(),
            choice,
        }
    }

    pub fn denied(handshake_id: HandshakeId, reason: DenialReason) -> Self {
        HandshakeDecision::Denied {
            handshake_id,
            decided_at: Timestamp::now(),
            reason,
        }
    }

    pub fn handshake_id(&self) -> &HandshakeId {
        match self {
            HandshakeDecision::Allowed { handshake_id, .. }
            | HandshakeDecision::Denied { handshake_id, .. } => handshake_id,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, HandshakeDecision::Allowed { .. })
    }

    pub fn disposition(&self) -> GateDisposition {
        match self {
            HandshakeDecision::Allowed { .. } => GateDisposition::Proceed,
            HandshakeDecision::Denied {
                reason: DenialReason::Rejected(category),
                ..
            } if category.cancels_action() => GateDisposition::Cancel,
            HandshakeDecision::Denied { .. } => GateDisposition::Block,
        }
    }
}
