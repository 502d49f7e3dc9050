//! printauth-transport: clients for the print authorization endpoint.

pub mod error;
pub mod http;
pub mod scripted;

pub use error::{BuildError, BuildResult};
pub use http::{HttpTransport, HttpTransportBuilder, API_KEY_HEADER};
pub use scripted::ScriptedTransport;
