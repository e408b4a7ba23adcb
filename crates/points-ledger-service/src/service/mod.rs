//! 服务层
//!
//! 实现积分业务逻辑，协调仓储层的事务。
//!
//! ## 模块结构
//!
//! - `dto`: 服务层请求与结果定义
//! - `ledger_service`: 余额查询、入账、出账、转账、审计、兑换退还
//! - `share_service`: 分享提交去重与审核
//! - `redemption_service`: 兑换报价、兑换扣减与履约提交

pub mod dto;
pub mod ledger_service;
pub mod redemption_service;
pub mod share_service;

use std::time::Instant;

use engage_shared::observability::metrics;

use crate::error::Result;

pub use dto::*;
pub use ledger_service::LedgerService;
pub use redemption_service::{
    FulfillmentGateway, HttpFulfillmentGateway, QueuedFulfillmentGateway, RedemptionService,
};
pub use share_service::ShareService;

/// 记录操作结果指标
fn observe<T>(operation: &str, result: &Result<T>, start: Instant) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.error_code(),
    };
    metrics::record_ledger_operation(operation, status, start.elapsed().as_secs_f64());
}
