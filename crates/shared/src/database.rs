//! PostgreSQL 连接池
//!
//! 账本写操作在事务内持有会员级 advisory lock，每个并发写请求占用一个连接直到提交，
//! `max_connections` 即积分写入的并发上限。`/ready` 探针与启动迁移也经由这里。

use crate::config::DatabaseConfig;
use crate::error::{Result, SharedError};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 可克隆的连接池句柄，进程内所有请求共享同一个池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 建池并校验首个连接，URL 不可达时启动失败
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(
            max_connections = config.max_connections,
            "Connecting to ledger database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("Ledger database pool ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 就绪检查：能拿到连接并执行查询即视为可接收账本请求
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(SharedError::from)
    }

    /// 等待在途事务归还连接后关闭，用于优雅停机
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Ledger database pool closed");
    }

    /// 执行服务自带的迁移
    ///
    /// 迁移脚本随服务二进制编译期嵌入，多实例同时启动时由 sqlx 的迁移锁保证只执行一次
    #[instrument(skip(self, migrator))]
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        info!(migrations = migrator.iter().count(), "Applying ledger migrations");
        migrator.run(&self.pool).await?;
        info!("Ledger schema up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "需要 PostgreSQL"]
    async fn test_pool_ready_and_closes() {
        let config = crate::test_utils::test_database_config();
        let db = Database::connect(&config).await.unwrap();
        db.health_check().await.unwrap();

        db.close().await;
        assert!(db.health_check().await.is_err());
    }
}
