//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查 (公共)
//! - [`orders`] - 下单、订单查询与取消
//! - [`payments`] - 支付发起、网关回调与核实
//! - [`devices`] - FCM 设备令牌注册
//! - [`admin`] - 管理端：订单状态推进与取消审批

pub mod admin;
pub mod devices;
pub mod health;
pub mod orders;
pub mod payments;
