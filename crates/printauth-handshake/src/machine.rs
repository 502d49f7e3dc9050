//! The authorization handshake state machine.
//!
//! The machine is pure: it consumes one `HandshakeEvent` at a time and
//! returns the `Effect`s its driver must carry out. It never performs I/O,
//! so at most one handshake can be in flight and at most one network request
//! can be outstanding for it.
//!
//! ```text
//! Idle ──prompt──▶ AwaitingCredential ──credential──▶ Authenticating
//!  ▲                     │ none                         │ failure / error
//!  │◀────────────────────┘◀─────────────────────────────┘
//!  │                                                    │ success
//!  │                                                    ▼
//!  │             ConfirmingMaterial ◀──choice── AwaitingMaterialChoice
//!  │ confirmed           │ failure / error                ▲
//!  └─────────────────────┴────────────────────────────────┘
//! ```

use std::fmt;

use printauth_core::{
    AuthorizationRequest, AuthorizationResult, Command, ConfirmationResult, DenialReason,
    HandshakeDecision, HandshakeId, MaterialChoice, MaterialOption, Notification, PluginMessage,
    TransportError,
};
use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, MessageClassifier};
use crate::notice;

// ---------------------------------------------------------------------------
// States, events and effects
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum HandshakeState {
    Idle,
    AwaitingCredential {
        handshake_id: HandshakeId,
    },
    Authenticating {
        handshake_id: HandshakeId,
        request: AuthorizationRequest,
    },
    AwaitingMaterialChoice {
        handshake_id: HandshakeId,
        result: AuthorizationResult,
    },
    ConfirmingMaterial {
        handshake_id: HandshakeId,
        result: AuthorizationResult,
        choice: MaterialChoice,
    },
}

/// Field-less view of `HandshakeState` for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStateKind {
    Idle,
    AwaitingCredential,
    Authenticating,
    AwaitingMaterialChoice,
    ConfirmingMaterial,
}

impl fmt::Display for HandshakeStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStateKind::Idle => "idle",
            HandshakeStateKind::AwaitingCredential => "awaiting_credential",
            HandshakeStateKind::Authenticating => "authenticating",
            HandshakeStateKind::AwaitingMaterialChoice => "awaiting_material_choice",
            HandshakeStateKind::ConfirmingMaterial => "confirming_material",
        };
        f.write_str(name)
    }
}

impl HandshakeState {
    pub fn kind(&self) -> HandshakeStateKind {
        match self {
            HandshakeState::Idle => HandshakeStateKind::Idle,
            HandshakeState::AwaitingCredential { .. } => HandshakeStateKind::AwaitingCredential,
            HandshakeState::Authenticating { .. } => HandshakeStateKind::Authenticating,
            HandshakeState::AwaitingMaterialChoice { .. } => {
                HandshakeStateKind::AwaitingMaterialChoice
            }
            HandshakeState::ConfirmingMaterial { .. } => HandshakeStateKind::ConfirmingMaterial,
        }
    }

    pub fn handshake_id(&self) -> Option<&HandshakeId> {
        match self {
            HandshakeState::Idle => None,
            HandshakeState::AwaitingCredential { handshake_id }
            | HandshakeState::Authenticating { handshake_id, .. }
            | HandshakeState::AwaitingMaterialChoice { handshake_id, .. }
            | HandshakeState::ConfirmingMaterial { handshake_id, .. } => Some(handshake_id),
        }
    }
}

/// Everything that can advance the machine.
#[derive(Debug)]
pub enum HandshakeEvent {
    PluginMessage(PluginMessage),
    CredentialCollected(Option<String>),
    AuthenticateCompleted(Result<AuthorizationResult, TransportError>),
    MaterialChosen(MaterialChoice),
    ConfirmCompleted(Result<ConfirmationResult, TransportError>),
}

impl HandshakeEvent {
    fn name(&self) -> &'static str {
        match self {
            HandshakeEvent::PluginMessage(_) => "plugin_message",
            HandshakeEvent::CredentialCollected(_) => "credential_collected",
            HandshakeEvent::AuthenticateCompleted(_) => "authenticate_completed",
            HandshakeEvent::MaterialChosen(_) => "material_chosen",
            HandshakeEvent::ConfirmCompleted(_) => "confirm_completed",
        }
    }
}

/// Instructions for the driver. Within one step at most one effect starts an
/// asynchronous operation (`PromptCredential` or `Submit`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PromptCredential,
    Submit(Command),
    RenderMaterialChoice {
        welcome_name: String,
        materials: Vec<MaterialOption>,
    },
    DisableChoiceInputs(bool),
    Notify(Notification),
    CloseModal,
    Settle(HandshakeDecision),
}

impl Effect {
    pub fn is_async(&self) -> bool {
        matches!(self, Effect::PromptCredential | Effect::Submit(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeStats {
    pub started: u64,
    pub allowed: u64,
    pub denied: u64,
    /// Authorization requests dropped because a handshake was already pending.
    pub dropped_requests: u64,
    /// Material choices ignored while a confirmation was in flight.
    pub suppressed_choices: u64,
}

// ---------------------------------------------------------------------------
// HandshakeMachine
// ---------------------------------------------------------------------------

pub struct HandshakeMachine {
    plugin_id: String,
    state: HandshakeState,
    classifier: Box<dyn Classifier>,
    stats: HandshakeStats,
}

impl fmt::Debug for HandshakeMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeMachine")
            .field("plugin_id", &self.plugin_id)
            .field("state", &self.state.kind())
            .field("stats", &self.stats)
            .finish()
    }
}

impl HandshakeMachine {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self::with_classifier(plugin_id, Box::new(MessageClassifier))
    }

    pub fn with_classifier(plugin_id: impl Into<String>, classifier: Box<dyn Classifier>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            state: HandshakeState::Idle,
            classifier,
            stats: HandshakeStats::default(),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn stats(&self) -> HandshakeStats {
        self.stats
    }

    /// Advance the machine by one event.
    pub fn step(&mut self, event: HandshakeEvent) -> Vec<Effect> {
        let state = std::mem::replace(&mut self.state, HandshakeState::Idle);
        let from = state.kind();
        let event_name = event.name();

        let (next, effects) = match (state, event) {
            (HandshakeState::Idle, HandshakeEvent::PluginMessage(message)) => {
                self.on_plugin_message(message)
            }

            (state, HandshakeEvent::PluginMessage(message)) => {
                if message.requests_authorization(&self.plugin_id) {
                    self.stats.dropped_requests += 1;
                    tracing::warn!(
                        state = %state.kind(),
                        "authorization request dropped; a handshake is already in progress"
                    );
                }
                (state, Vec::new())
            }

            (
                HandshakeState::AwaitingCredential { handshake_id },
                HandshakeEvent::CredentialCollected(credential),
            ) => self.on_credential(handshake_id, credential),

            (
                HandshakeState::Authenticating { handshake_id, .. },
                HandshakeEvent::AuthenticateCompleted(outcome),
            ) => self.on_authenticated(handshake_id, outcome),

            (
                HandshakeState::AwaitingMaterialChoice {
                    handshake_id,
                    result,
                },
                HandshakeEvent::MaterialChosen(choice),
            ) => {
                tracing::info!(handshake_id = %handshake_id, choice = %choice, "material chosen");
                (
                    HandshakeState::ConfirmingMaterial {
                        handshake_id,
                        result,
                        choice,
                    },
                    vec![
                        Effect::DisableChoiceInputs(true),
                        Effect::Submit(Command::confirm_material(choice)),
                    ],
                )
            }

            (
                state @ HandshakeState::ConfirmingMaterial { .. },
                HandshakeEvent::MaterialChosen(_),
            ) => {
                self.stats.suppressed_choices += 1;
                tracing::debug!("material choice ignored; confirmation already in flight");
                (state, Vec::new())
            }

            (
                HandshakeState::ConfirmingMaterial {
                    handshake_id,
                    result,
                    choice,
                },
                HandshakeEvent::ConfirmCompleted(outcome),
            ) => self.on_confirmed(handshake_id, result, choice, outcome),

            (state, _) => {
                tracing::debug!(state = %state.kind(), event = event_name, "event ignored");
                (state, Vec::new())
            }
        };

        if next.kind() != from {
            tracing::debug!(
                from = %from,
                to = %next.kind(),
                event = event_name,
                "handshake transition",
            );
        }
        self.state = next;
        effects
    }

    fn on_plugin_message(&mut self, message: PluginMessage) -> (HandshakeState, Vec<Effect>) {
        if !message.requests_authorization(&self.plugin_id) {
            tracing::trace!(plugin = %message.plugin, "plugin message ignored");
            return (HandshakeState::Idle, Vec::new());
        }

        let handshake_id = HandshakeId::generate();
        self.stats.started += 1;
        tracing::info!(
            handshake_id = %handshake_id,
            "authorization requested; prompting for credential",
        );
        (
            HandshakeState::AwaitingCredential { handshake_id },
            vec![Effect::PromptCredential],
        )
    }

    fn on_credential(
        &mut self,
        handshake_id: HandshakeId,
        credential: Option<String>,
    ) -> (HandshakeState, Vec<Effect>) {
        match AuthorizationRequest::from_credential(credential) {
            None => {
                tracing::info!(handshake_id = %handshake_id, "no credential provided");
                self.deny(handshake_id, DenialReason::NoCredential, notice::no_credential())
            }
            Some(request) => {
                let command = Command::authenticate(&request);
                (
                    HandshakeState::Authenticating {
                        handshake_id,
                        request,
                    },
                    vec![Effect::Submit(command)],
                )
            }
        }
    }

    fn on_authenticated(
        &mut self,
        handshake_id: HandshakeId,
        outcome: Result<AuthorizationResult, TransportError>,
    ) -> (HandshakeState, Vec<Effect>) {
        match outcome {
            Err(err) => {
                tracing::error!(
                    handshake_id = %handshake_id,
                    error = %err,
                    "authenticate request failed",
                );
                self.deny(
                    handshake_id,
                    DenialReason::TransportFailure,
                    notice::authentication_unreachable(),
                )
            }
            Ok(result) if !result.success => {
                let message = result.failure_message();
                let category = self.classifier.classify(message);
                tracing::warn!(
                    handshake_id = %handshake_id,
                    category = %category,
                    "authentication rejected"
                );
                let notification = notice::authentication_failed(category, message);
                self.deny(handshake_id, DenialReason::Rejected(category), notification)
            }
            Ok(result) => {
                tracing::info!(
                    handshake_id = %handshake_id,
                    materials = result.materials.len(),
                    "authenticated; awaiting material choice"
                );
                let effect = Effect::RenderMaterialChoice {
                    welcome_name: result.welcome_name(),
                    materials: result.materials.clone(),
                };
                (
                    HandshakeState::AwaitingMaterialChoice {
                        handshake_id,
                        result,
                    },
                    vec![effect],
                )
            }
        }
    }

    fn on_confirmed(
        &mut self,
        handshake_id: HandshakeId,
        result: AuthorizationResult,
        choice: MaterialChoice,
        outcome: Result<ConfirmationResult, TransportError>,
    ) -> (HandshakeState, Vec<Effect>) {
        // Failures keep the modal open with the choices re-enabled.
        let retry_notice = match outcome {
            Ok(confirmation) if confirmation.success => {
                self.stats.allowed += 1;
                tracing::info!(
                    handshake_id = %handshake_id,
                    choice = %choice,
                    "material confirmed; action allowed",
                );
                return (
                    HandshakeState::Idle,
                    vec![
                        Effect::CloseModal,
                        Effect::Notify(notice::material_confirmed(&confirmation.message)),
                        Effect::Settle(HandshakeDecision::allowed(handshake_id, choice)),
                    ],
                );
            }
            Ok(confirmation) => {
                tracing::warn!(handshake_id = %handshake_id, "material confirmation refused");
                notice::confirmation_failed(&confirmation.message)
            }
            Err(err) => {
                tracing::error!(
                    handshake_id = %handshake_id,
                    error = %err,
                    "confirm_material request failed",
                );
                notice::confirmation_unreachable()
            }
        };

        (
            HandshakeState::AwaitingMaterialChoice {
                handshake_id,
                result,
            },
            vec![
                Effect::DisableChoiceInputs(false),
                Effect::Notify(retry_notice),
            ],
        )
    }

    fn deny(
        &mut self,
        handshake_id: HandshakeId,
        reason: DenialReason,
        notification: Notification,
    ) -> (HandshakeState, Vec<Effect>) {
        self.stats.denied += 1;
        (
            HandshakeState::Idle,
            vec![
                Effect::Notify(notification),
                Effect::Settle(HandshakeDecision::denied(handshake_id, reason)),
            ],
        )
    }
}
