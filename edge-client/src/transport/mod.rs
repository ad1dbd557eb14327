//! How commands reach the edge server
//!
//! - [`HttpTransport`] - reqwest against the HTTP boundary
//! - [`OneshotTransport`] - in-process `tower::oneshot` on the axum router
//!
//! Both classify failures the same way:
//!
//! | Status | Error |
//! |--------|-------|
//! | 4xx except 408/429 | [`TransportError::Rejected`] |
//! | 408, 429, 502, 503, 504 | [`TransportError::Transient`] |
//! | other 5xx | [`TransportError::Server`] |

mod http;
mod oneshot;

pub use self::http::HttpTransport;
pub use self::oneshot::OneshotTransport;

use async_trait::async_trait;
use shared::command::{CommandEnvelope, CommandOutcome};
use shared::error::{ErrorBody, ErrorKind};
use shared::models::Terminal;

use crate::error::TransportError;

pub(crate) const COMMANDS_PATH: &str = "/api/commands";
pub(crate) const TERMINALS_PATH: &str = "/api/terminals";

#[async_trait]
pub trait CommandTransport: Send + Sync + std::fmt::Debug {
    /// Idempotent by terminal code
    async fn register_terminal(&self, code: &str) -> Result<Terminal, TransportError>;

    async fn submit(&self, envelope: &CommandEnvelope) -> Result<CommandOutcome, TransportError>;
}

/// Map a non-success status and its body to a transport error
pub(crate) fn classify(status: u16, body: &[u8]) -> TransportError {
    // Throttling and request timeouts clear up on their own
    if (400..500).contains(&status) && status != 408 && status != 429 {
        let body = serde_json::from_slice::<ErrorBody>(body).unwrap_or_else(|_| ErrorBody {
            code: format!("HTTP_{status}"),
            kind: ErrorKind::Validation,
            message: String::from_utf8_lossy(body).into_owned(),
            details: serde_json::Value::Null,
        });
        TransportError::Rejected { status, body }
    } else if status >= 500 && !matches!(status, 502..=504) {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|b| b.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
        TransportError::Server { status, message }
    } else {
        TransportError::Transient(format!("HTTP {status}: {}", String::from_utf8_lossy(body)))
    }
}
