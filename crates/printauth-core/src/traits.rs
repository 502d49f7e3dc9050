use async_trait::async_trait;

use crate::error::TransportResult;
use crate::types::{
    AuthorizationRequest, AuthorizationResult, Command, CommandResponse, ConfirmationResult,
    HandshakeDecision, MaterialChoice, MaterialOption, Notification,
};

// ---------------------------------------------------------------------------
// AuthorizationTransport: the single authorization endpoint
//
// Exactly one network call per submit, no built-in retries. `confirm_material`
// is not idempotent; callers must send it at most once per handshake.
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AuthorizationTransport: Send + Sync {
    async fn submit(&self, command: &Command) -> TransportResult<CommandResponse>;

    async fn authenticate(
        &self,
        request: &AuthorizationRequest,
    ) -> TransportResult<AuthorizationResult> {
        self.submit(&Command::authenticate(request))
            .await?
            .into_authorization()
    }

    async fn confirm_material(
        &self,
        choice: MaterialChoice,
    ) -> TransportResult<ConfirmationResult> {
        self.submit(&Command::confirm_material(choice))
            .await?
            .into_confirmation()
    }
}

// ---------------------------------------------------------------------------
// PresentationSink: renders prompts, the material modal and notifications
//
// User material choices travel back to the handshake as inputs on a channel
// the sink's owner hands it; only the credential prompt is request/response.
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PresentationSink: Send + Sync {
    /// Ask for a credential. `None` means the user declined.
    async fn prompt_credential(&self) -> Option<String>;

    fn render_material_choice(&self, welcome_name: &str, materials: &[MaterialOption]);

    fn disable_choice_inputs(&self, disabled: bool);

    fn notify(&self, notification: &Notification);

    fn close_modal(&self);
}

// ---------------------------------------------------------------------------
// ActionGate: receives the terminal decision of every handshake
// ---------------------------------------------------------------------------

pub trait ActionGate: Send + Sync {
    fn settle(&self, decision: &HandshakeDecision);
}
