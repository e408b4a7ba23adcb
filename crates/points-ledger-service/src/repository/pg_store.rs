//! PostgreSQL 积分存储
//!
//! 同一会员的余额读写通过事务级咨询锁串行化：
//! `pg_advisory_xact_lock(hashtextextended(member_id::text, 0))`，事务结束自动释放。
//! 加锁后在 READ COMMITTED 下读取最新余额并追加流水，不会丢失更新。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::traits::{PointsStore, PointsTx};
use crate::error::{LedgerError, Result};
use crate::models::{
    LedgerEntry, NewLedgerEntry, Platform, ReferenceType, ShareStatus, ShareVerification,
    SocialShare,
};

/// PostgreSQL 积分存储
#[derive(Clone)]
pub struct PgPointsStore {
    pool: PgPool,
}

impl PgPointsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PointsStore for PgPointsStore {
    async fn begin(&self) -> Result<Box<dyn PointsTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPointsTx { tx }))
    }

    async fn member_exists(&self, member_id: Uuid) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
                .bind(member_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn latest_balance(&self, member_id: Uuid) -> Result<i64> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(
                (SELECT balance_after
                 FROM point_ledger
                 WHERE member_id = $1
                 ORDER BY id DESC
                 LIMIT 1),
                0
            )
            "#,
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    async fn list_entries(&self, member_id: Uuid, limit: i64) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, member_id, transaction_type, source, amount, balance_after,
                   reference_type, reference_id, transfer_group, metadata, created_at
            FROM point_ledger
            WHERE member_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(member_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_entries_in_order(&self, member_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, member_id, transaction_type, source, amount, balance_after,
                   reference_type, reference_id, transfer_group, metadata, created_at
            FROM point_ledger
            WHERE member_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_transfer_entries(&self, transfer_group: Uuid) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, member_id, transaction_type, source, amount, balance_after,
                   reference_type, reference_id, transfer_group, metadata, created_at
            FROM point_ledger
            WHERE transfer_group = $1
            ORDER BY id ASC
            "#,
        )
        .bind(transfer_group)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn get_share(&self, share_id: Uuid) -> Result<Option<SocialShare>> {
        let share = sqlx::query_as::<_, SocialShare>(
            r#"
            SELECT id, member_id, platform, content_type, content_id, share_url, share_hash,
                   status, points_awarded, verified_at, created_at, updated_at
            FROM social_shares
            WHERE id = $1
            "#,
        )
        .bind(share_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(share)
    }

    async fn list_member_shares(&self, member_id: Uuid, limit: i64) -> Result<Vec<SocialShare>> {
        let shares = sqlx::query_as::<_, SocialShare>(
            r#"
            SELECT id, member_id, platform, content_type, content_id, share_url, share_hash,
                   status, points_awarded, verified_at, created_at, updated_at
            FROM social_shares
            WHERE member_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(member_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(shares)
    }

    async fn list_share_verifications(&self, share_id: Uuid) -> Result<Vec<ShareVerification>> {
        let verifications = sqlx::query_as::<_, ShareVerification>(
            r#"
            SELECT id, share_id, verification_method, proof_url, verified_by, status,
                   rejection_reason, verified_at
            FROM share_verifications
            WHERE share_id = $1
            ORDER BY verified_at ASC
            "#,
        )
        .bind(share_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(verifications)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// PostgreSQL 积分事务
pub struct PgPointsTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PointsTx for PgPointsTx {
    async fn member_exists(&mut self, member_id: Uuid) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
                .bind(member_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn lock_members(&mut self, member_ids: &[Uuid]) -> Result<()> {
        let mut ordered = member_ids.to_vec();
        ordered.sort();
        ordered.dedup();

        for member_id in ordered {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
                .bind(member_id)
                .execute(&mut *self.tx)
                .await?;
            debug!(%member_id, "Member advisory lock acquired");
        }

        Ok(())
    }

    async fn latest_balance(&mut self, member_id: Uuid) -> Result<i64> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(
                (SELECT balance_after
                 FROM point_ledger
                 WHERE member_id = $1
                 ORDER BY id DESC
                 LIMIT 1),
                0
            )
            "#,
        )
        .bind(member_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(balance)
    }

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        // clock_timestamp() 而非 NOW()：锁等待后的写入时间不早于前一笔
        let created = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO point_ledger (member_id, transaction_type, source, amount, balance_after,
                                      reference_type, reference_id, transfer_group, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, clock_timestamp())
            RETURNING id, member_id, transaction_type, source, amount, balance_after,
                      reference_type, reference_id, transfer_group, metadata, created_at
            "#,
        )
        .bind(entry.member_id)
        .bind(entry.transaction_type)
        .bind(&entry.source)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(entry.reference_type)
        .bind(&entry.reference_id)
        .bind(entry.transfer_group)
        .bind(Json(&entry.metadata))
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn get_entry(&mut self, entry_id: i64) -> Result<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, member_id, transaction_type, source, amount, balance_after,
                   reference_type, reference_id, transfer_group, metadata, created_at
            FROM point_ledger
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn find_entries_by_reference(
        &mut self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, member_id, transaction_type, source, amount, balance_after,
                   reference_type, reference_id, transfer_group, metadata, created_at
            FROM point_ledger
            WHERE reference_type = $1 AND reference_id = $2
            ORDER BY id ASC
            "#,
        )
        .bind(reference_type)
        .bind(reference_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(entries)
    }

    async fn find_share(
        &mut self,
        member_id: Uuid,
        platform: Platform,
        share_hash: &str,
    ) -> Result<Option<SocialShare>> {
        let share = sqlx::query_as::<_, SocialShare>(
            r#"
            SELECT id, member_id, platform, content_type, content_id, share_url, share_hash,
                   status, points_awarded, verified_at, created_at, updated_at
            FROM social_shares
            WHERE member_id = $1 AND platform = $2 AND share_hash = $3
            "#,
        )
        .bind(member_id)
        .bind(platform)
        .bind(share_hash)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(share)
    }

    async fn insert_share(&mut self, share: &SocialShare) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_shares (id, member_id, platform, content_type, content_id, share_url,
                                       share_hash, status, points_awarded, verified_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(share.id)
        .bind(share.member_id)
        .bind(share.platform)
        .bind(share.content_type)
        .bind(&share.content_id)
        .bind(&share.share_url)
        .bind(&share.share_hash)
        .bind(share.status)
        .bind(share.points_awarded)
        .bind(share.verified_at)
        .bind(share.created_at)
        .bind(share.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateShare {
                    member_id: share.member_id,
                    platform: share.platform.as_str().to_string(),
                }
            } else {
                LedgerError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn get_share_for_update(&mut self, share_id: Uuid) -> Result<Option<SocialShare>> {
        let share = sqlx::query_as::<_, SocialShare>(
            r#"
            SELECT id, member_id, platform, content_type, content_id, share_url, share_hash,
                   status, points_awarded, verified_at, created_at, updated_at
            FROM social_shares
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(share_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(share)
    }

    async fn mark_share(
        &mut self,
        share_id: Uuid,
        status: ShareStatus,
        points_awarded: i64,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE social_shares
            SET status = $2, points_awarded = $3, verified_at = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(share_id)
        .bind(status)
        .bind(points_awarded)
        .bind(verified_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::ShareNotFound(share_id));
        }

        Ok(())
    }

    async fn insert_verification(&mut self, verification: &ShareVerification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO share_verifications (id, share_id, verification_method, proof_url,
                                             verified_by, status, rejection_reason, verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(verification.id)
        .bind(verification.share_id)
        .bind(verification.verification_method)
        .bind(&verification.proof_url)
        .bind(verification.verified_by)
        .bind(verification.status)
        .bind(&verification.rejection_reason)
        .bind(verification.verified_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::AlreadyVerified(verification.share_id)
            } else {
                LedgerError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
