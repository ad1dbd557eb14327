use edge_server::{Config, Server, ServerState, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载配置 (.env + 环境变量)
    let config = Config::from_env();

    // 2. 日志 (控制台 + logs/app + logs/security)
    let log_dir = config.log_dir();
    init_logger_with_file(&config.log_level, config.log_json, Some(&log_dir))?;

    print_banner();
    tracing::info!(work_dir = %config.work_dir, "🦀 Edge Server starting...");

    // 3. 初始化服务器状态
    let state = ServerState::initialize(&config)?;
    state.bootstrap()?;

    // 4. 启动 HTTP 服务器 (会启动后台任务)
    if let Err(e) = Server::with_state(config, state).run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
