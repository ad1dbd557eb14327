//! Server Implementation
//!
//! HTTP 服务器启动和管理

use shared::error::{AppError, AppResult};

use crate::core::{Config, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// 启动后台任务并提供 HTTP 服务，直到 Ctrl-C
    pub async fn run(self) -> AppResult<()> {
        let tasks = self.state.start_background_tasks();

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!("🦀 Edge Server listening on {}", addr);

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };

        let app = crate::api::router(self.state.clone());
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AppError::internal(format!("HTTP server error: {e}")));

        // 审计 worker 在退出前会 flush outbox
        tasks.shutdown().await;
        served
    }
}
