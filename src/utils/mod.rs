//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] / [`AppResponse`] - 统一错误类型和响应结构
//! - [`logger`] - tracing 日志初始化
//! - [`money`] - KWD (fils) 金额转换
//! - [`time`] - Unix millis 时间工具

pub mod error;
pub mod logger;
pub mod money;
pub mod time;

pub use error::{AppError, AppResponse, AppResult};
pub use error::{ok, ok_with_message};
