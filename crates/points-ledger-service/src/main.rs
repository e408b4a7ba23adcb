//! 积分账本服务
//!
//! 提供积分余额、流水、转账、分享奖励与兑换的 REST API。

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, http::HeaderValue, routing::get};
use engage_shared::{config::AppConfig, database::Database, observability};
use points_ledger::{
    MIGRATOR, PgPointsStore, api,
    service::{FulfillmentGateway, HttpFulfillmentGateway, QueuedFulfillmentGateway},
    state::AppState,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 从 config/{service_name}.toml 及 ENGAGE_ 环境变量加载，失败时回退默认值
    let (config, load_error) = match AppConfig::load("points-ledger-service") {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    // 日志初始化之后才能输出
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    info!("Starting points-ledger-service on {}", config.server_addr());

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
    }

    let store = Arc::new(PgPointsStore::new(db.pool().clone()));

    // 未配置履约地址时订单仅记录，由履约服务按流水拉取
    let gateway: Arc<dyn FulfillmentGateway> = match &config.redemption.fulfillment_url {
        Some(url) => {
            info!("Fulfillment gateway: {}", url);
            Arc::new(HttpFulfillmentGateway::new(
                url.clone(),
                Duration::from_secs(config.redemption.fulfillment_timeout_seconds),
            )?)
        }
        None => {
            warn!("ENGAGE_REDEMPTION__FULFILLMENT_URL not set, redemptions will be queued");
            Arc::new(QueuedFulfillmentGateway)
        }
    };

    let state = AppState::new(store, gateway, &config);

    let app = api::build_router(state)
        .merge(readiness_routes(db.clone()))
        .layer(cors_layer(config.is_production()));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// CORS 配置：通过 ENGAGE_CORS_ORIGINS 环境变量控制允许的来源
fn cors_layer(is_production: bool) -> CorsLayer {
    let allowed_origins = std::env::var("ENGAGE_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if allowed_origins == "*" {
        if is_production {
            warn!("ENGAGE_CORS_ORIGINS=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn readiness_routes(db: Database) -> Router {
    Router::new().route(
        "/ready",
        get(move || readiness_check(db.clone())),
    )
}

/// 就绪探针：检查数据库连接是否可用
async fn readiness_check(db: Database) -> Json<serde_json::Value> {
    let db_ok = db.health_check().await.is_ok();

    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "service": "points-ledger-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" }
        }
    }))
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("注册 Ctrl+C 处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("注册 SIGTERM 处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
