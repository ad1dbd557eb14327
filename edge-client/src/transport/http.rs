//! HTTP transport for the edge server boundary

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::command::{CommandEnvelope, CommandOutcome};
use shared::models::{Terminal, TerminalRegister};

use super::{COMMANDS_PATH, CommandTransport, TERMINALS_PATH, classify};
use crate::config::SyncConfig;
use crate::error::{ClientError, ClientResult, TransportError};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(classify(status.as_u16(), &bytes));
        }
        // A 2xx we cannot read is the server's problem; the request id makes a retry safe
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Transient(format!("Invalid response: {e}")))
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn register_terminal(&self, code: &str) -> Result<Terminal, TransportError> {
        self.post(TERMINALS_PATH, &TerminalRegister { code: code.to_string() })
            .await
    }

    async fn submit(&self, envelope: &CommandEnvelope) -> Result<CommandOutcome, TransportError> {
        self.post(COMMANDS_PATH, envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Nothing listens on port 9 of localhost in the test environment
        let config = SyncConfig::new("http://127.0.0.1:9/", "POS-1", "unused.redb")
            .with_timeout(Duration::from_millis(500));
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport.register_terminal("POS-1").await.unwrap_err();
        assert!(err.is_transient());
    }
}
