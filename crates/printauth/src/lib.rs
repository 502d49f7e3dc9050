//! printauth root library
//!
//! Configuration, error handling and the wiring that connects the handshake
//! gatekeeper to a real authorization endpoint, an inbound listener and a
//! presentation sink. The binary in `main.rs` is a thin CLI over this.

pub mod config;
pub mod error;
pub mod listener;
pub mod sink;

pub use config::{EndpointConfig, ListenConfig, RootConfig};
pub use error::{RootError, RootResult};

use printauth_core::{
    ActionGate, AuthorizationTransport, GateDisposition, HandshakeDecision, PresentationSink,
};
use printauth_handshake::Gatekeeper;
use printauth_transport::HttpTransport;
use std::sync::Arc;

/// Build the HTTP transport described by `config`.
pub fn build_transport(config: &EndpointConfig) -> RootResult<HttpTransport> {
    let mut builder = HttpTransport::builder()
        .endpoint(config.url.clone())
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout());
    if let Some(key) = &config.api_key {
        builder = builder.api_key(key.clone());
    }
    Ok(builder.build()?)
}

/// Assemble a gatekeeper for `config.plugin_id` from its collaborators.
pub fn build_gatekeeper(
    config: &RootConfig,
    transport: Arc<dyn AuthorizationTransport>,
    sink: Arc<dyn PresentationSink>,
    gate: Arc<dyn ActionGate>,
) -> RootResult<Gatekeeper> {
    config.validate()?;
    let gatekeeper = Gatekeeper::builder()
        .plugin_id(config.plugin_id.clone())
        .transport(transport)
        .sink(sink)
        .gate(gate)
        .build()?;
    tracing::debug!(
        plugin_id = %config.plugin_id,
        endpoint = %config.endpoint.url,
        "gatekeeper assembled",
    );
    Ok(gatekeeper)
}

/// Process exit status for a one-shot handshake: 0 only when the decision
/// lets the print proceed. No decision means confirmation never completed.
pub fn handshake_exit_code(decision: Option<&HandshakeDecision>) -> u8 {
    match decision.map(HandshakeDecision::disposition) {
        Some(GateDisposition::Proceed) => 0,
        Some(GateDisposition::Block) | Some(GateDisposition::Cancel) | None => 1,
    }
}
