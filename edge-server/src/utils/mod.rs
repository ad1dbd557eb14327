//! 工具模块 - 通用工具函数
//!
//! - 日志初始化
//! - 输入校验

pub mod logger;
pub mod validation;
