//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "points_ledger_operations_total",
        "Total number of ledger operations by outcome"
    );
    metrics::describe_histogram!(
        "points_ledger_operation_duration_seconds",
        "Ledger operation duration in seconds"
    );
    metrics::describe_counter!("points_credited_total", "Total points credited");
    metrics::describe_counter!("points_debited_total", "Total points debited");

    metrics::describe_counter!("share_submissions_total", "Total number of share submissions");
    metrics::describe_counter!(
        "share_verifications_total",
        "Total number of admin share verifications"
    );

    metrics::describe_counter!("redemptions_total", "Total number of redemptions");
    metrics::describe_counter!(
        "redemption_fulfillment_failures_total",
        "Redemptions whose debit committed but fulfillment failed"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录账本操作结果
///
/// status 为 "success" 或错误码
#[inline]
pub fn record_ledger_operation(operation: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "points_ledger_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "points_ledger_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// 记录入账积分
#[inline]
pub fn record_points_credited(transaction_type: &str, points: i64) {
    metrics::counter!(
        "points_credited_total",
        "transaction_type" => transaction_type.to_string()
    )
    .increment(points.unsigned_abs());
}

/// 记录出账积分
#[inline]
pub fn record_points_debited(transaction_type: &str, points: i64) {
    metrics::counter!(
        "points_debited_total",
        "transaction_type" => transaction_type.to_string()
    )
    .increment(points.unsigned_abs());
}

/// 记录分享提交
#[inline]
pub fn record_share_submission(platform: &str, status: &str) {
    metrics::counter!(
        "share_submissions_total",
        "platform" => platform.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录分享审核
#[inline]
pub fn record_share_verification(decision: &str) {
    metrics::counter!(
        "share_verifications_total",
        "decision" => decision.to_string()
    )
    .increment(1);
}

/// 记录兑换
#[inline]
pub fn record_redemption(product_type: &str, status: &str) {
    metrics::counter!(
        "redemptions_total",
        "product_type" => product_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录履约失败（扣减已提交，需人工补偿）
#[inline]
pub fn record_fulfillment_failure(carrier: &str) {
    metrics::counter!(
        "redemption_fulfillment_failures_total",
        "carrier" => carrier.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未安装 recorder 时所有记录函数应为空操作
        record_http_request("GET", "/health", 200, 0.001);
        record_ledger_operation("add_points", "success", 0.01);
        record_ledger_operation("deduct_points", "INSUFFICIENT_BALANCE", 0.01);
        record_points_credited("earn", 50);
        record_points_debited("redeem", -60);
        record_share_submission("facebook", "success");
        record_share_verification("approved");
        record_redemption("airtime", "success");
        record_fulfillment_failure("mtn");
    }
}
