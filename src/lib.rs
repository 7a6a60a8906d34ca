//! Ragy Server - 定制服装电商后端
//!
//! # 架构概述
//!
//! 下单与支付协调管道的五个组件：
//!
//! - **库存账本** (`inventory`): 面料颜色库存的唯一修改入口，防超卖
//! - **订单仓储** (`db`): SQLite 持久层，发票号、地址/价格快照
//! - **支付协调器** (`payments`): KNET 会话生命周期与回调核实
//! - **订单状态机** (`orders`): 履约状态转换、时间戳、取消回补
//! - **通知派发器** (`notifications`): 事务提交后的 FCM 推送
//!
//! # 模块结构
//!
//! ```text
//! src/
//! ├── core/           # 配置、状态、HTTP 服务器
//! ├── auth/           # JWT 认证、中间件
//! ├── db/             # 连接池、模型、仓储
//! ├── inventory/      # 库存账本
//! ├── orders/         # 下单、状态机、取消审批
//! ├── payments/       # KNET 网关与支付协调器
//! ├── notifications/  # FCM 推送派发
//! ├── api/            # HTTP 路由和处理器
//! └── utils/          # 错误、日志、金额、时间
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ____
   / __ \____ _____ ___  __
  / /_/ / __ `/ __ `/ / / /
 / _, _/ /_/ / /_/ / /_/ /
/_/ |_|\__,_/\__, /\__, /
            /____//____/
    "#
    );
}
