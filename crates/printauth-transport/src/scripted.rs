//! In-memory transport that replays queued responses.
//!
//! Every submitted command is recorded so callers can assert on exactly what
//! reached the "endpoint". An exhausted queue behaves like an unreachable
//! endpoint.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use printauth_core::{
    AuthorizationResult, AuthorizationTransport, Command, CommandResponse, ConfirmationResult,
    TransportError, TransportResult,
};

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<TransportResult<CommandResponse>>>,
    sent: Mutex<Vec<Command>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_authorization(&self, result: AuthorizationResult) {
        self.push(Ok(CommandResponse::Authorization(result)));
    }

    pub fn push_confirmation(&self, result: ConfirmationResult) {
        self.push(Ok(CommandResponse::Confirmation(result)));
    }

    pub fn push_error(&self, error: TransportError) {
        self.push(Err(error));
    }

    /// Commands received so far, in order.
    pub fn sent(&self) -> Vec<Command> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of commands received with the given wire name.
    pub fn count(&self, name: &str) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, response: TransportResult<CommandResponse>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }
}

#[async_trait]
impl AuthorizationTransport for ScriptedTransport {
    async fn submit(&self, command: &Command) -> TransportResult<CommandResponse> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| Err(TransportError::Connect("no scripted response".into())))
    }
}
