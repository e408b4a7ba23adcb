//! HTTP 请求处理器模块
//!
//! 包含所有 REST API 端点的处理器实现

pub mod admin;
pub mod points;
pub mod redemptions;
pub mod shares;

use axum::Json;

use super::dto::HealthResponse;

/// 存活检查
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "points-ledger-service",
    })
}
