//! printauth-handshake: the authorization handshake that gates a print start.
//!
//! A print start is held until the requester has entered a credential, the
//! authorization endpoint has accepted it, and a material choice has been
//! confirmed. [`HandshakeMachine`] holds the rules as a pure state machine;
//! [`Gatekeeper`] drives it against the injected transport, presentation
//! sink and action gate.

pub mod classifier;
pub mod error;
pub mod gate;
pub mod gatekeeper;
pub mod machine;
pub mod notice;
pub mod render;
pub mod scripted_sink;

pub use classifier::{classify, Classifier, MessageClassifier};
pub use error::{HandshakeError, HandshakeResult};
pub use gate::{ChannelGate, LogGate};
pub use gatekeeper::{Gatekeeper, GatekeeperBuilder, HandshakeInput};
pub use machine::{
    Effect, HandshakeEvent, HandshakeMachine, HandshakeState, HandshakeStateKind, HandshakeStats,
};
pub use scripted_sink::{ScriptedSink, SinkCall};
