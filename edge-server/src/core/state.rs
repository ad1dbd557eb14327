use std::sync::Arc;

use parking_lot::Mutex;
use shared::error::{AppError, AppResult};
use tokio::sync::mpsc;

use super::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::audit::{AuditService, AuditWorker};
use crate::auth::{LoginRateLimiter, RoleService, StaffDirectory};
use crate::commands::CommandGateway;
use crate::db::Storage;
use crate::idempotency::CommandProcessor;
use crate::message::{EventBus, Outbox};
use crate::orders::OrdersManager;
use crate::shifts::ShiftManager;
use crate::tables::OccupancySweeper;
use crate::terminals::TerminalRegistry;

/// 服务器状态 - 持有所有服务的共享引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | storage | redb 存储 |
/// | gateway | 命令入口 (幂等 + 角色 + 事务) |
/// | outbox | 提交后分发审计通知与事件 |
/// | staff / terminals | 员工目录、终端注册 |
/// | login_limiter | 登录限流 |
///
/// 所有字段都是浅拷贝（内部 `Arc`），`Clone` 成本很低。
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub storage: Storage,
    pub outbox: Outbox,
    pub gateway: CommandGateway,
    pub staff: StaffDirectory,
    pub terminals: TerminalRegistry,
    pub login_limiter: LoginRateLimiter,
    /// 审计 worker 的接收端，由 `start_background_tasks` 取走
    audit_rx: Arc<Mutex<Option<mpsc::Receiver<u64>>>>,
}

impl ServerState {
    /// 打开工作目录下的数据库并组装服务
    pub fn initialize(config: &Config) -> AppResult<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .map_err(|e| AppError::internal(format!("Failed to create work dir {}: {e}", config.work_dir)))?;
        let storage = Storage::open(config.db_path())?;
        tracing::info!(path = %config.db_path().display(), "Database opened");
        Ok(Self::with_storage(config.clone(), storage))
    }

    /// 内存数据库（测试、演示）
    pub fn in_memory(config: Config) -> AppResult<Self> {
        Ok(Self::with_storage(config, Storage::open_in_memory()?))
    }

    pub fn with_storage(config: Config, storage: Storage) -> Self {
        let (audit, audit_rx) = AuditService::new(storage.clone(), config.audit_buffer_size);
        let bus = EventBus::new(config.event_channel_capacity);
        let outbox = Outbox::new(audit, bus);

        let staff = StaffDirectory::new(storage.clone());
        let roles: Arc<dyn RoleService> = Arc::new(staff.clone());
        let processor = CommandProcessor::new(storage.clone(), outbox.clone(), config.idempotency_key_max_len);
        let orders = OrdersManager::new(ShiftManager::new(config.variance_threshold));
        let gateway = CommandGateway::new(processor, orders, roles);

        let login_limiter =
            LoginRateLimiter::new(storage.clone(), config.login_max_attempts, config.login_window_secs);

        Self {
            terminals: TerminalRegistry::new(storage.clone()),
            staff,
            gateway,
            login_limiter,
            outbox,
            storage,
            audit_rx: Arc::new(Mutex::new(Some(audit_rx))),
            config,
        }
    }

    pub fn bus(&self) -> &EventBus {
        self.outbox.bus()
    }

    pub fn audit(&self) -> &AuditService {
        self.outbox.audit()
    }

    /// 员工表为空时按配置创建管理员
    pub fn bootstrap(&self) -> AppResult<()> {
        if let Some((username, password)) = &self.config.bootstrap_admin
            && let Some(admin) = self.staff.bootstrap_admin(username, password)?
        {
            tracing::info!(staff_id = %admin.id, username = %admin.username, "Bootstrap admin created");
        }
        Ok(())
    }

    /// 启动后台任务：审计 worker + 占用清扫
    ///
    /// 只有第一次调用会启动审计 worker（接收端只有一个）。
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        match self.audit_rx.lock().take() {
            Some(rx) => {
                let worker = AuditWorker::new(self.audit().storage().clone(), self.config.audit_max_retries);
                let token = tasks.shutdown_token();
                tasks.spawn("audit_worker", TaskKind::Worker, worker.run(rx, token));
            }
            None => tracing::warn!("Audit worker already started"),
        }

        let sweeper = OccupancySweeper::new(
            self.storage.clone(),
            self.outbox.clone(),
            self.config.sweep_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("occupancy_sweeper", TaskKind::Periodic, sweeper.run());

        tracing::info!(count = tasks.len(), "Background tasks started");
        tasks
    }
}
