//! Edge Server - 餐厅 POS 边缘节点核心
//!
//! # 架构概述
//!
//! 一条命令的路径：
//!
//! ```text
//! POST /api/commands
//!   → CommandGateway       (resource_id / 角色校验)
//!   → CommandProcessor     (幂等键，单个 redb WriteTransaction)
//!   → OrdersManager / ShiftManager / TableLock
//!   → commit
//!   → Outbox::dispatch     (唤醒 AuditWorker，广播 EventBus)
//! ```
//!
//! # 模块结构
//!
//! ```text
//! edge-server/src/
//! ├── core/          # 配置、状态、后台任务、HTTP 服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── commands/      # 命令分发 + 角色集合
//! ├── idempotency/   # 幂等命令处理器
//! ├── orders/        # 订单状态机、商品目录、支付
//! ├── shifts/        # 班次与现金账
//! ├── tables/        # 桌台占用锁 + 清扫
//! ├── terminals/     # 终端注册
//! ├── auth/          # 角色服务、密码、登录限流
//! ├── audit/         # 哈希链审计日志 (outbox + worker)
//! ├── message/       # 事件总线、提交后副作用
//! ├── db/            # redb 存储
//! └── utils/         # 日志、输入校验
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod commands;
pub mod core;
pub mod db;
pub mod idempotency;
pub mod message;
pub mod orders;
pub mod shifts;
pub mod tables;
pub mod terminals;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export 公共类型
pub use commands::CommandGateway;
pub use core::{Config, Server, ServerState};
pub use db::Storage;
pub use message::{EventBus, Outbox};
pub use orders::OrdersManager;
pub use shared::error::{AppError, AppResult};

pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ______    __
   / ____/___/ /___ ____
  / __/ / __  / __ `/ _ \
 / /___/ /_/ / /_/ /  __/
/_____/\__,_/\__, /\___/
            /____/
    "#
    );
}
