//! 积分账本服务
//!
//! 以只追加的账本记录会员积分，余额始终等于最新一条流水的 balance_after。
//!
//! ## 模块结构
//!
//! - `models`: 账本流水、分享、兑换等领域模型
//! - `repository`: 存储抽象及 PostgreSQL、内存两种实现
//! - `service`: 入账、出账、转账、分享审核、兑换等业务逻辑
//! - `api`: axum HTTP 接口
//! - `state`: 路由共享状态

pub mod api;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod state;

pub use error::{LedgerError, Result};
pub use repository::{MemoryPointsStore, PgPointsStore, PointsStore, PointsTx};
pub use service::{LedgerService, RedemptionService, ShareService};
pub use state::AppState;

/// 数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
