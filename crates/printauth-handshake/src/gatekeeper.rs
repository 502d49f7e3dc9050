//! Async driver that connects the handshake machine to its collaborators.
//!
//! The gatekeeper owns the machine and at most one in-flight operation: the
//! credential prompt or a single transport call. External inputs and the
//! completion of that operation are multiplexed, so a material click that
//! arrives while `confirm_material` is outstanding still reaches the machine
//! and is suppressed there instead of queueing a second request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use printauth_core::{
    ActionGate, AuthorizationTransport, Command, CommandResponse, MaterialChoice, PluginMessage,
    PresentationSink,
};
use tokio::sync::{mpsc, watch};

use crate::classifier::{Classifier, MessageClassifier};
use crate::error::{HandshakeError, HandshakeResult};
use crate::machine::{Effect, HandshakeEvent, HandshakeMachine, HandshakeStateKind, HandshakeStats};

/// Inputs that originate outside the handshake.
#[derive(Debug, Clone)]
pub enum HandshakeInput {
    PluginMessage(PluginMessage),
    MaterialChosen(MaterialChoice),
}

impl From<HandshakeInput> for HandshakeEvent {
    fn from(input: HandshakeInput) -> Self {
        match input {
            HandshakeInput::PluginMessage(message) => HandshakeEvent::PluginMessage(message),
            HandshakeInput::MaterialChosen(choice) => HandshakeEvent::MaterialChosen(choice),
        }
    }
}

type InFlight = Pin<Box<dyn Future<Output = HandshakeEvent> + Send>>;

enum Wake {
    Completed(HandshakeEvent),
    Input(HandshakeInput),
    Closed,
}

// ---------------------------------------------------------------------------
// GatekeeperBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct GatekeeperBuilder {
    plugin_id: Option<String>,
    transport: Option<Arc<dyn AuthorizationTransport>>,
    sink: Option<Arc<dyn PresentationSink>>,
    gate: Option<Arc<dyn ActionGate>>,
    classifier: Option<Box<dyn Classifier>>,
}

impl GatekeeperBuilder {
    pub fn plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn AuthorizationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PresentationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn gate(mut self, gate: Arc<dyn ActionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> HandshakeResult<Gatekeeper> {
        let plugin_id = self
            .plugin_id
            .ok_or(HandshakeError::MissingCollaborator("plugin id"))?;
        if plugin_id.is_empty() || plugin_id.chars().any(char::is_whitespace) {
            return Err(HandshakeError::InvalidPluginId(plugin_id));
        }
        let transport = self
            .transport
            .ok_or(HandshakeError::MissingCollaborator("transport"))?;
        let sink = self
            .sink
            .ok_or(HandshakeError::MissingCollaborator("presentation sink"))?;
        let gate = self
            .gate
            .ok_or(HandshakeError::MissingCollaborator("action gate"))?;
        let classifier = self.classifier.unwrap_or_else(|| Box::new(MessageClassifier));

        let (state_tx, _) = watch::channel(HandshakeStateKind::Idle);
        Ok(Gatekeeper {
            machine: HandshakeMachine::with_classifier(plugin_id, classifier),
            transport,
            sink,
            gate,
            state_tx,
            in_flight: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Gatekeeper
// ---------------------------------------------------------------------------

pub struct Gatekeeper {
    machine: HandshakeMachine,
    transport: Arc<dyn AuthorizationTransport>,
    sink: Arc<dyn PresentationSink>,
    gate: Arc<dyn ActionGate>,
    state_tx: watch::Sender<HandshakeStateKind>,
    in_flight: Option<InFlight>,
}

impl Gatekeeper {
    pub fn builder() -> GatekeeperBuilder {
        GatekeeperBuilder::default()
    }

    pub fn plugin_id(&self) -> &str {
        self.machine.plugin_id()
    }

    /// Watch the machine's state. The receiver outlives the gatekeeper and
    /// reports a closed channel once it is dropped.
    pub fn subscribe(&self) -> watch::Receiver<HandshakeStateKind> {
        self.state_tx.subscribe()
    }

    pub fn state_kind(&self) -> HandshakeStateKind {
        self.machine.state().kind()
    }

    pub fn stats(&self) -> HandshakeStats {
        self.machine.stats()
    }

    /// Apply one input and await every operation it sets off, until the
    /// machine is waiting on the outside world again.
    pub async fn drive(&mut self, input: HandshakeInput) -> HandshakeStateKind {
        self.apply(input.into());
        while let Some(operation) = self.in_flight.take() {
            let event = operation.await;
            self.apply(event);
        }
        self.state_kind()
    }

    /// Process inputs until the channel closes. An operation still in flight
    /// at that point is dropped.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<HandshakeInput>) -> HandshakeStats {
        tracing::info!(plugin_id = %self.plugin_id(), "gatekeeper started");

        loop {
            let wake = {
                let in_flight = self.in_flight.as_mut();
                let completion = async move {
                    match in_flight {
                        Some(operation) => operation.await,
                        None => std::future::pending().await,
                    }
                };

                tokio::select! {
                    biased;
                    event = completion => Wake::Completed(event),
                    input = inputs.recv() => match input {
                        Some(input) => Wake::Input(input),
                        None => Wake::Closed,
                    },
                }
            };

            match wake {
                Wake::Completed(event) => {
                    self.in_flight = None;
                    self.apply(event);
                }
                Wake::Input(input) => self.apply(input.into()),
                Wake::Closed => break,
            }
        }

        if self.in_flight.is_some() {
            tracing::warn!(
                state = %self.state_kind(),
                "input channel closed; abandoning in-flight operation",
            );
        }
        let stats = self.stats();
        tracing::info!(
            started = stats.started,
            allowed = stats.allowed,
            denied = stats.denied,
            "gatekeeper stopped"
        );
        stats
    }

    fn apply(&mut self, event: HandshakeEvent) {
        for effect in self.machine.step(event) {
            self.perform(effect);
        }
        self.state_tx.send_replace(self.machine.state().kind());
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::PromptCredential => {
                let sink = Arc::clone(&self.sink);
                self.start(Box::pin(async move {
                    HandshakeEvent::CredentialCollected(sink.prompt_credential().await)
                }));
            }
            Effect::Submit(command) => {
                let transport = Arc::clone(&self.transport);
                self.start(Box::pin(async move { execute(transport.as_ref(), command).await }));
            }
            Effect::RenderMaterialChoice {
                welcome_name,
                materials,
            } => self.sink.render_material_choice(&welcome_name, &materials),
            Effect::DisableChoiceInputs(disabled) => self.sink.disable_choice_inputs(disabled),
            Effect::Notify(notification) => self.sink.notify(&notification),
            Effect::CloseModal => self.sink.close_modal(),
            Effect::Settle(decision) => self.gate.settle(&decision),
        }
    }

    fn start(&mut self, operation: InFlight) {
        debug_assert!(self.in_flight.is_none(), "only one operation may be in flight");
        self.in_flight = Some(operation);
    }
}

/// Send one command and turn the outcome into the matching completion event.
async fn execute(transport: &dyn AuthorizationTransport, command: Command) -> HandshakeEvent {
    tracing::debug!(command = command.name(), "submitting command");
    let response = transport.submit(&command).await;
    match command {
        Command::Authenticate { .. } => HandshakeEvent::AuthenticateCompleted(
            response.and_then(CommandResponse::into_authorization),
        ),
        Command::ConfirmMaterial { .. } => HandshakeEvent::ConfirmCompleted(
            response.and_then(CommandResponse::into_confirmation),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::gate::ChannelGate;
    use crate::notice;
    use crate::scripted_sink::{ScriptedSink, SinkCall};
    use printauth_core::{
        AuthorizationResult, ConfirmationResult, DenialReason, ErrorCategory, GateDisposition,
        HandshakeDecision, MaterialOption, NotificationKind, TransportError,
    };
    use printauth_transport::ScriptedTransport;

    const PLUGIN: &str = "print_auth_plugin";

    struct Harness {
        gatekeeper: Gatekeeper,
        transport: Arc<ScriptedTransport>,
        sink: Arc<ScriptedSink>,
        decisions: mpsc::UnboundedReceiver<HandshakeDecision>,
    }

    fn harness(transport: ScriptedTransport, sink: ScriptedSink) -> Harness {
        let transport = Arc::new(transport);
        let sink = Arc::new(sink);
        let (gate, decisions) = ChannelGate::new();
        let gatekeeper = Gatekeeper::builder()
            .plugin_id(PLUGIN)
            .transport(transport.clone())
            .sink(sink.clone())
            .gate(Arc::new(gate))
            .build()
            .unwrap();
        Harness {
            gatekeeper,
            transport,
            sink,
            decisions,
        }
    }

    fn prompt() -> HandshakeInput {
        HandshakeInput::PluginMessage(PluginMessage::prompt(PLUGIN))
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = Gatekeeper::builder()
            .plugin_id(PLUGIN)
            .sink(Arc::new(ScriptedSink::new(None)))
            .gate(Arc::new(crate::gate::LogGate))
            .build()
            .err()
            .unwrap();
        assert_eq!(err, HandshakeError::MissingCollaborator("transport"));
    }

    #[test]
    fn test_builder_rejects_bad_plugin_id() {
        for id in ["", "print auth"] {
            let err = Gatekeeper::builder()
                .plugin_id(id)
                .transport(Arc::new(ScriptedTransport::new()))
                .sink(Arc::new(ScriptedSink::new(None)))
                .gate(Arc::new(crate::gate::LogGate))
                .build()
                .err()
                .unwrap();
            assert_eq!(err, HandshakeError::InvalidPluginId(id.to_string()));
        }
    }

    #[tokio::test]
    async fn test_no_credential_sends_nothing() {
        let mut h = harness(ScriptedTransport::new(), ScriptedSink::new(Some("  ".into())));
        let state = h.gatekeeper.drive(prompt()).await;

        assert_eq!(state, HandshakeStateKind::Idle);
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.sink.notifications(), vec![notice::no_credential()]);
        let decision = h.decisions.recv().await.unwrap();
        assert!(matches!(
            decision,
            HandshakeDecision::Denied {
                reason: DenialReason::NoCredential,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_permission_rejection_cancels() {
        let transport = ScriptedTransport::new();
        transport.push_authorization(AuthorizationResult::rejected(
            "User lacks required permission",
        ));
        let mut h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));
        h.gatekeeper.drive(prompt()).await;

        assert_eq!(h.transport.count("authenticate"), 1);
        let notices = h.sink.notifications();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::Error);
        assert!(notices[0].message.contains("User lacks required permission"));
        assert!(notices[0]
            .message
            .ends_with("Please check the email address or contact staff."));

        let decision = h.decisions.recv().await.unwrap();
        assert_eq!(decision.disposition(), GateDisposition::Cancel);
        assert!(!h
            .sink
            .calls()
            .iter()
            .any(|c| matches!(c, SinkCall::RenderMaterialChoice { .. })));
    }

    #[tokio::test]
    async fn test_network_rejection_uses_network_notice() {
        let transport = ScriptedTransport::new();
        transport.push_authorization(AuthorizationResult::rejected("Network error: timed out"));
        let mut h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));
        h.gatekeeper.drive(prompt()).await;

        assert_eq!(
            h.sink.notifications(),
            vec![notice::authentication_failed(
                ErrorCategory::NetworkError,
                "Network error: timed out"
            )]
        );
        let decision = h.decisions.recv().await.unwrap();
        assert_eq!(decision.disposition(), GateDisposition::Block);
    }

    #[tokio::test]
    async fn test_transport_failure_denies() {
        let transport = ScriptedTransport::new();
        transport.push_error(TransportError::Timeout);
        let mut h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));
        let state = h.gatekeeper.drive(prompt()).await;

        assert_eq!(state, HandshakeStateKind::Idle);
        assert_eq!(
            h.sink.notifications(),
            vec![notice::authentication_unreachable()]
        );
        assert!(matches!(
            h.decisions.recv().await.unwrap(),
            HandshakeDecision::Denied {
                reason: DenialReason::TransportFailure,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_successful_handshake_with_escaped_materials() {
        let transport = ScriptedTransport::new();
        let mut granted = AuthorizationResult::granted(
            "Jane",
            vec![
                MaterialOption::new("<b>PLA</b>", "gram", "0.05")
                    .with_purchase_url("https://shop.example/pla"),
                MaterialOption::new("PETG", "gram", "0.07"),
            ],
        );
        granted.last_name = Some("Doe".into());
        transport.push_authorization(granted);
        transport.push_confirmation(ConfirmationResult::confirmed("Material recorded"));
        let mut h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));

        let state = h.gatekeeper.drive(prompt()).await;
        assert_eq!(state, HandshakeStateKind::AwaitingMaterialChoice);
        assert!(h.sink.modal_open());

        let html = h
            .sink
            .calls()
            .into_iter()
            .find_map(|c| match c {
                SinkCall::RenderMaterialChoice { welcome, html } => {
                    assert_eq!(welcome, "Welcome Jane Doe!");
                    Some(html)
                }
                _ => None,
            })
            .unwrap();
        assert!(html.contains("&lt;b&gt;PLA&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
        assert_eq!(html.matches("target=\"_blank\"").count(), 1);

        let state = h
            .gatekeeper
            .drive(HandshakeInput::MaterialChosen(MaterialChoice::Paid))
            .await;
        assert_eq!(state, HandshakeStateKind::Idle);
        assert!(!h.sink.modal_open());
        assert_eq!(h.transport.count("confirm_material"), 1);
        assert_eq!(
            h.sink.notifications().last().unwrap(),
            &notice::material_confirmed("Material recorded")
        );

        let decision = h.decisions.recv().await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(h.gatekeeper.stats().allowed, 1);
    }

    #[tokio::test]
    async fn test_confirmation_failure_allows_retry() {
        let transport = ScriptedTransport::new();
        transport.push_authorization(AuthorizationResult::granted("Jane", vec![]));
        transport.push_confirmation(ConfirmationResult::refused("Could not record material"));
        transport.push_confirmation(ConfirmationResult::confirmed("ok"));
        let mut h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));

        h.gatekeeper.drive(prompt()).await;
        let state = h
            .gatekeeper
            .drive(HandshakeInput::MaterialChosen(MaterialChoice::OwnMaterial))
            .await;
        assert_eq!(state, HandshakeStateKind::AwaitingMaterialChoice);
        assert!(h.sink.modal_open());
        assert!(!h.sink.inputs_disabled());
        assert!(h.decisions.try_recv().is_err());

        let state = h
            .gatekeeper
            .drive(HandshakeInput::MaterialChosen(MaterialChoice::OwnMaterial))
            .await;
        assert_eq!(state, HandshakeStateKind::Idle);
        assert_eq!(h.transport.count("confirm_material"), 2);
        assert!(h.decisions.recv().await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_rapid_choices_send_one_confirmation() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(200));
        transport.push_authorization(AuthorizationResult::granted("Jane", vec![]));
        transport.push_confirmation(ConfirmationResult::confirmed("ok"));
        let h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));
        let Harness {
            gatekeeper,
            transport,
            mut decisions,
            ..
        } = h;

        let mut state = gatekeeper.subscribe();
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(gatekeeper.run(rx));

        tx.send(prompt()).await.unwrap();
        state
            .wait_for(|s| *s == HandshakeStateKind::AwaitingMaterialChoice)
            .await
            .unwrap();

        for _ in 0..5 {
            tx.send(HandshakeInput::MaterialChosen(MaterialChoice::Paid))
                .await
                .unwrap();
        }
        assert!(decisions.recv().await.unwrap().is_allowed());

        drop(tx);
        let stats = task.await.unwrap();
        assert_eq!(transport.count("confirm_material"), 1);
        assert_eq!(stats.suppressed_choices, 4);
        assert_eq!(stats.allowed, 1);
    }

    #[tokio::test]
    async fn test_second_request_while_pending_is_dropped() {
        let transport = ScriptedTransport::new().with_latency(Duration::from_millis(100));
        transport.push_authorization(AuthorizationResult::rejected("db locked"));
        let h = harness(transport, ScriptedSink::new(Some("a@b.com".into())));
        let Harness {
            gatekeeper,
            transport,
            mut decisions,
            ..
        } = h;

        let mut state = gatekeeper.subscribe();
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(gatekeeper.run(rx));

        tx.send(prompt()).await.unwrap();
        state
            .wait_for(|s| *s == HandshakeStateKind::Authenticating)
            .await
            .unwrap();
        tx.send(prompt()).await.unwrap();
        decisions.recv().await.unwrap();

        drop(tx);
        let stats = task.await.unwrap();
        assert_eq!(stats.started, 1);
        assert_eq!(stats.dropped_requests, 1);
        assert_eq!(transport.count("authenticate"), 1);
    }

    #[tokio::test]
    async fn test_run_with_auto_choice_completes() {
        let transport = ScriptedTransport::new();
        transport.push_authorization(AuthorizationResult::granted("Jane", vec![]));
        transport.push_confirmation(ConfirmationResult::confirmed("ok"));
        let (tx, rx) = mpsc::channel(16);
        let sink = ScriptedSink::new(Some("a@b.com".into()))
            .with_auto_choice(MaterialChoice::OwnMaterial, tx.clone());
        let h = harness(transport, sink);
        let Harness {
            gatekeeper,
            mut decisions,
            sink,
            ..
        } = h;

        let task = tokio::spawn(gatekeeper.run(rx));
        tx.send(prompt()).await.unwrap();
        match decisions.recv().await.unwrap() {
            HandshakeDecision::Allowed { choice, .. } => {
                assert_eq!(choice, MaterialChoice::OwnMaterial)
            }
            other => panic!("unexpected decision {other:?}"),
        }
        drop(tx);
        // The sink still holds a sender; abort instead of waiting for close.
        task.abort();
        assert!(sink.calls().contains(&SinkCall::DisableChoiceInputs(true)));
    }
}
