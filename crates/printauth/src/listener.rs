//! Axum listener for host-originated events.
//!
//! The host pushes plugin messages here; a browser or kiosk front end may
//! also post material clicks. Both are forwarded to the gatekeeper's input
//! channel and never processed inline.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use printauth_core::{MaterialChoice, PluginMessage};
use printauth_handshake::{HandshakeInput, HandshakeStateKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::{RootError, RootResult};

/// Shared application state for Axum handlers.
pub struct AppState {
    pub plugin_id: String,
    pub inputs: mpsc::Sender<HandshakeInput>,
    pub state: watch::Receiver<HandshakeStateKind>,
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/plugin-message", post(handle_plugin_message))
        .route("/material-choice", post(handle_material_choice))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve the router until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> RootResult<()> {
    let addr = listener.local_addr().map_err(RootError::Io)?;
    tracing::info!(addr = %addr, "listening for plugin messages");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(RootError::Io)
}

/// POST /plugin-message -- hand a host message to the gatekeeper
async fn handle_plugin_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<PluginMessage>,
) -> impl IntoResponse {
    tracing::debug!(
        plugin = %message.plugin,
        prompt = message.data.prompt,
        "plugin message received",
    );
    forward(&state, HandshakeInput::PluginMessage(message)).await
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialChoiceBody {
    pub choice: MaterialChoice,
}

/// POST /material-choice -- a click on one of the material buttons
async fn handle_material_choice(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MaterialChoiceBody>,
) -> impl IntoResponse {
    forward(&state, HandshakeInput::MaterialChosen(body.choice)).await
}

async fn forward(state: &AppState, input: HandshakeInput) -> (StatusCode, Json<serde_json::Value>) {
    match state.inputs.send(input).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "accepted": true })),
        ),
        Err(_) => {
            tracing::error!("gatekeeper input channel closed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "accepted": false,
                    "error": "gatekeeper stopped",
                })),
            )
        }
    }
}

/// GET /health -- version, plugin id and handshake state
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let current = *state.state.borrow();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "plugin_id": state.plugin_id,
        "state": current,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(state: Arc<AppState>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state, std::future::pending()));
        addr
    }

    fn app_state() -> (
        Arc<AppState>,
        mpsc::Receiver<HandshakeInput>,
        watch::Sender<HandshakeStateKind>,
    ) {
        let (tx, rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(HandshakeStateKind::Idle);
        let state = Arc::new(AppState {
            plugin_id: "print_auth_plugin".into(),
            inputs: tx,
            state: state_rx,
        });
        (state, rx, state_tx)
    }

    #[tokio::test]
    async fn test_plugin_message_is_forwarded() {
        let (state, mut rx, _state_tx) = app_state();
        let addr = spawn(state).await;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/plugin-message"))
            .json(&serde_json::json!({"plugin": "print_auth_plugin", "data": {"prompt": true}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);

        match rx.recv().await.unwrap() {
            HandshakeInput::PluginMessage(message) => {
                assert!(message.requests_authorization("print_auth_plugin"))
            }
            other => panic!("unexpected input {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_material_choice_is_forwarded() {
        let (state, mut rx, _state_tx) = app_state();
        let addr = spawn(state).await;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/material-choice"))
            .json(&serde_json::json!({"choice": "own_material"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);
        assert!(matches!(
            rx.recv().await.unwrap(),
            HandshakeInput::MaterialChosen(MaterialChoice::OwnMaterial)
        ));
    }

    #[tokio::test]
    async fn test_stopped_gatekeeper_is_unavailable() {
        let (state, rx, _state_tx) = app_state();
        drop(rx);
        let addr = spawn(state).await;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/plugin-message"))
            .json(&serde_json::json!({"plugin": "print_auth_plugin", "data": {"prompt": true}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_health_reports_state() {
        let (state, _rx, state_tx) = app_state();
        let addr = spawn(state).await;
        state_tx.send_replace(HandshakeStateKind::AwaitingMaterialChoice);

        let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["plugin_id"], "print_auth_plugin");
        assert_eq!(health["state"], "awaiting_material_choice");
    }
}
