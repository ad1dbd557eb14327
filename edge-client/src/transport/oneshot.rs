//! In-process transport
//!
//! Calls the edge server's axum router directly with `tower::oneshot`, for a
//! terminal embedded in the same process as the edge node. Same status-code
//! classification as [`super::HttpTransport`].

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::command::{CommandEnvelope, CommandOutcome};
use shared::models::{Terminal, TerminalRegister};
use tower::ServiceExt;

use super::{COMMANDS_PATH, CommandTransport, TERMINALS_PATH, classify};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct OneshotTransport {
    router: Router,
}

impl OneshotTransport {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T, TransportError> {
        let payload = serde_json::to_vec(body).map_err(|e| TransportError::Transient(e.to_string()))?;
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(classify(status.as_u16(), &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Transient(format!("Invalid response: {e}")))
    }
}

#[async_trait]
impl CommandTransport for OneshotTransport {
    async fn register_terminal(&self, code: &str) -> Result<Terminal, TransportError> {
        self.post(TERMINALS_PATH, &TerminalRegister { code: code.to_string() })
            .await
    }

    async fn submit(&self, envelope: &CommandEnvelope) -> Result<CommandOutcome, TransportError> {
        self.post(COMMANDS_PATH, envelope).await
    }
}
