//! 应用状态定义
//!
//! 包含 Axum 路由共享的服务实例

use std::sync::Arc;

use engage_shared::config::AppConfig;

use crate::repository::PointsStore;
use crate::service::{FulfillmentGateway, LedgerService, RedemptionService, ShareService};

/// Axum 应用共享状态
///
/// 三个服务共用同一个存储实现，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerService>,
    pub shares: Arc<ShareService>,
    pub redemptions: Arc<RedemptionService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PointsStore>,
        gateway: Arc<dyn FulfillmentGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            ledger: Arc::new(LedgerService::new(store.clone(), config.points.clone())),
            shares: Arc::new(ShareService::new(store.clone(), config.points.clone())),
            redemptions: Arc::new(RedemptionService::new(
                store,
                gateway,
                config.redemption.clone(),
            )),
        }
    }
}
