use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::notifications::{FcmClient, NotificationDispatcher, PushClient};
use crate::orders::state_machine::{OrderLocks, OrderStateMachine};
use crate::orders::{CancellationService, PlacementService};
use crate::payments::coordinator::{PaymentCoordinator, PaymentUrls};
use crate::payments::{KnetGateway, PaymentGateway};

/// 服务器状态 - 持有所有共享组件的单例引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。网关与推送客户端以 trait
/// 对象注入，测试时可替换为 mock。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | pool | SQLite 连接池 |
/// | jwt_service | JWT 认证服务 |
/// | gateway | KNET 支付网关客户端 |
/// | push | FCM 推送客户端 |
/// | order_locks | 订单级转换锁 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    pub jwt_service: Arc<JwtService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub push: Arc<dyn PushClient>,
    pub order_locks: OrderLocks,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序：数据库 (含迁移) → JWT → 网关客户端 → 推送客户端。
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db = DbService::new(&config.database_path)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(KnetGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_api_key.clone(),
        ));
        let push: Arc<dyn PushClient> = Arc::new(FcmClient::new(
            config.fcm_endpoint.clone(),
            config.fcm_server_key.clone(),
        ));

        Ok(Self {
            config: config.clone(),
            pool: db.pool,
            jwt_service,
            gateway,
            push,
            order_locks: Arc::new(DashMap::new()),
        })
    }

    pub fn jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }

    pub fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(self.pool.clone(), self.push.clone())
    }

    pub fn state_machine(&self) -> OrderStateMachine {
        OrderStateMachine::new(
            self.pool.clone(),
            self.order_locks.clone(),
            self.dispatcher(),
        )
    }

    pub fn placement_service(&self) -> PlacementService {
        PlacementService::new(self.pool.clone(), self.dispatcher())
    }

    pub fn cancellation_service(&self) -> CancellationService {
        CancellationService::new(self.pool.clone(), self.state_machine())
    }

    pub fn payment_coordinator(&self) -> PaymentCoordinator {
        PaymentCoordinator::new(
            self.pool.clone(),
            self.gateway.clone(),
            self.state_machine(),
            self.dispatcher(),
            PaymentUrls {
                success_url: self.config.payment_success_url.clone(),
                error_url: self.config.payment_error_url.clone(),
            },
        )
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::notifications::test_support::MockPushClient;
    use crate::payments::gateway::test_support::MockGateway;

    /// State over an existing test pool, gateway and push mocked
    pub fn state_with_mocks(
        pool: SqlitePool,
    ) -> (ServerState, Arc<MockGateway>, Arc<MockPushClient>) {
        let jwt = JwtConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
            expiration_minutes: 60,
            issuer: "ragy-server".into(),
            audience: "ragy-app".into(),
        };
        let config = Config {
            work_dir: "/tmp/ragy-test".into(),
            database_path: String::new(),
            http_port: 0,
            jwt: jwt.clone(),
            environment: "test".into(),
            gateway_base_url: "http://gateway.invalid".into(),
            gateway_api_key: "test-key".into(),
            payment_success_url: "https://app.ragy.test/pay/success".into(),
            payment_error_url: "https://app.ragy.test/pay/error".into(),
            fcm_endpoint: "http://fcm.invalid".into(),
            fcm_server_key: String::new(),
        };

        let gateway = Arc::new(MockGateway::default());
        let push = Arc::new(MockPushClient::default());
        let state = ServerState {
            config,
            pool,
            jwt_service: Arc::new(JwtService::new(jwt)),
            gateway: gateway.clone(),
            push: push.clone(),
            order_locks: Arc::new(DashMap::new()),
        };
        (state, gateway, push)
    }
}
