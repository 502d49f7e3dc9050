//! Action gates: where handshake decisions leave the handshake.

use printauth_core::{ActionGate, GateDisposition, HandshakeDecision};
use tokio::sync::mpsc;

/// Records every decision in the log. The disposition is the only output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogGate;

impl ActionGate for LogGate {
    fn settle(&self, decision: &HandshakeDecision) {
        let handshake_id = decision.handshake_id();
        match (decision.disposition(), decision) {
            (GateDisposition::Proceed, HandshakeDecision::Allowed { choice, .. }) => {
                tracing::info!(
                    handshake_id = %handshake_id,
                    choice = %choice,
                    "gated action may proceed",
                );
            }
            (GateDisposition::Cancel, _) => {
                tracing::warn!(handshake_id = %handshake_id, "gated action must be canceled");
            }
            (disposition, _) => {
                tracing::warn!(handshake_id = %handshake_id, ?disposition, "gated action blocked");
            }
        }
    }
}

/// Forwards decisions to whoever owns the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelGate {
    tx: mpsc::UnboundedSender<HandshakeDecision>,
}

impl ChannelGate {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HandshakeDecision>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ActionGate for ChannelGate {
    fn settle(&self, decision: &HandshakeDecision) {
        if self.tx.send(decision.clone()).is_err() {
            tracing::warn!(
                handshake_id = %decision.handshake_id(),
                "decision receiver dropped; gated action stays blocked"
            );
        }
    }
}
