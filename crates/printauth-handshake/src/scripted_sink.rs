//! Non-interactive presentation sink.
//!
//! Answers the credential prompt from a fixed value and can pick a material
//! as soon as the modal is shown. Every instruction it receives is recorded,
//! with the material list rendered to escaped HTML, so the exact output a
//! host would display can be inspected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use printauth_core::{MaterialChoice, MaterialOption, Notification, PresentationSink};
use tokio::sync::mpsc;

use crate::gatekeeper::HandshakeInput;
use crate::render::{material_list_html, welcome_line};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    PromptCredential,
    RenderMaterialChoice { welcome: String, html: String },
    DisableChoiceInputs(bool),
    Notify(Notification),
    CloseModal,
}

pub struct ScriptedSink {
    credential: Option<String>,
    auto_choice: Option<(MaterialChoice, mpsc::Sender<HandshakeInput>)>,
    calls: Mutex<Vec<SinkCall>>,
    modal_open: AtomicBool,
    inputs_disabled: AtomicBool,
}

impl ScriptedSink {
    /// A sink that answers every credential prompt with `credential`.
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential,
            auto_choice: None,
            calls: Mutex::new(Vec::new()),
            modal_open: AtomicBool::new(false),
            inputs_disabled: AtomicBool::new(false),
        }
    }

    /// Select `choice` whenever the material modal is rendered, feeding it
    /// back through `inputs`.
    pub fn with_auto_choice(
        mut self,
        choice: MaterialChoice,
        inputs: mpsc::Sender<HandshakeInput>,
    ) -> Self {
        self.auto_choice = Some((choice, inputs));
        self
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Notify(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn modal_open(&self) -> bool {
        self.modal_open.load(Ordering::SeqCst)
    }

    pub fn inputs_disabled(&self) -> bool {
        self.inputs_disabled.load(Ordering::SeqCst)
    }

    fn record(&self, call: SinkCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl PresentationSink for ScriptedSink {
    async fn prompt_credential(&self) -> Option<String> {
        self.record(SinkCall::PromptCredential);
        self.credential.clone()
    }

    fn render_material_choice(&self, welcome_name: &str, materials: &[MaterialOption]) {
        self.record(SinkCall::RenderMaterialChoice {
            welcome: welcome_line(welcome_name),
            html: material_list_html(materials),
        });
        self.modal_open.store(true, Ordering::SeqCst);
        self.inputs_disabled.store(false, Ordering::SeqCst);

        if let Some((choice, inputs)) = &self.auto_choice {
            if inputs.try_send(HandshakeInput::MaterialChosen(*choice)).is_err() {
                tracing::warn!("scripted material choice could not be delivered");
            }
        }
    }

    fn disable_choice_inputs(&self, disabled: bool) {
        self.record(SinkCall::DisableChoiceInputs(disabled));
        self.inputs_disabled.store(disabled, Ordering::SeqCst);
    }

    fn notify(&self, notification: &Notification) {
        self.record(SinkCall::Notify(notification.clone()));
    }

    fn close_modal(&self) {
        self.record(SinkCall::CloseModal);
        self.modal_open.store(false, Ordering::SeqCst);
    }
}
