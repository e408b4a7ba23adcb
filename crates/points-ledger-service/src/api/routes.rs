//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router, middleware,
    routing::{get, post},
};
use engage_shared::observability::middleware as obs_middleware;

use super::handlers;
use crate::state::AppState;

/// 会员与管理员可读的查询路由
fn member_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/members/{id}/balance",
            get(handlers::points::get_balance),
        )
        .route("/members/{id}/ledger", get(handlers::points::get_ledger))
        .route(
            "/members/{id}/shares",
            get(handlers::shares::list_member_shares),
        )
        .route("/points/transfer", post(handlers::points::transfer_points))
        .route(
            "/points/transfers/{group}",
            get(handlers::points::get_transfer),
        )
        .route("/shares", post(handlers::shares::record_share))
        .route("/redemptions/quote", post(handlers::redemptions::quote))
        .route("/redemptions", post(handlers::redemptions::redeem))
}

/// 内部系统路由（入账/出账）
fn internal_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/internal/points/credit",
            post(handlers::points::credit_points),
        )
        .route("/internal/points/debit", post(handlers::points::debit_points))
}

/// 管理员路由
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/points/adjust", post(handlers::admin::adjust_points))
        .route(
            "/admin/points/refunds",
            post(handlers::admin::refund_redemption),
        )
        .route(
            "/admin/members/{id}/audit",
            get(handlers::admin::audit_member),
        )
        .route("/admin/shares/{id}", get(handlers::admin::get_share))
        .route(
            "/admin/shares/{id}/verify",
            post(handlers::admin::verify_share),
        )
        .route(
            "/admin/shares/{id}/verifications",
            get(handlers::admin::list_share_verifications),
        )
}

/// 构建 `/api/v1` 下的全部 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(member_routes())
        .merge(internal_routes())
        .merge(admin_routes())
}

/// 构建完整应用路由
///
/// http_tracing 以 route_layer 挂载，指标 path 标签取路由模板
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(handlers::health_check))
        .route_layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
