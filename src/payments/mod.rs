//! 支付域：KNET 网关客户端与支付协调器

pub mod coordinator;
pub mod gateway;

pub use coordinator::{PaymentCoordinator, PaymentUrls};
pub use gateway::{GatewayError, KnetGateway, PaymentGateway};
