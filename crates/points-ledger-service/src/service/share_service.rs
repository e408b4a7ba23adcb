//! 社交分享服务
//!
//! 分享提交按 (会员, 平台, 内容指纹) 去重，审核策略由 `ShareVerificationMode` 决定且互斥：
//!
//! - `Auto`: 提交即在同一事务内发放奖励，状态为 auto_verified，管理员审核返回已审核
//! - `Manual`: 提交后为 pending，只有管理员审核通过才发放奖励；驳回后可再次审核

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use engage_shared::config::{PointsConfig, ShareVerificationMode};
use engage_shared::observability::metrics;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    PointsChange, RecordShareRequest, RecordShareResult, VerifyShareRequest, VerifyShareResult,
};
use super::ledger_service::{credit_in_tx, ensure_member};
use super::observe;
use crate::error::{LedgerError, Result};
use crate::models::{
    EntryMetadata, LedgerEntry, NewSocialShare, ReferenceType, ShareStatus, ShareVerification,
    SocialShare, TransactionType, VerificationStatus,
};
use crate::repository::{PointsStore, PointsTx};

/// 社交分享服务
pub struct ShareService {
    store: Arc<dyn PointsStore>,
    config: PointsConfig,
}

impl ShareService {
    pub fn new(store: Arc<dyn PointsStore>, config: PointsConfig) -> Self {
        Self { store, config }
    }

    /// 提交分享
    #[instrument(
        skip(self, request),
        fields(member_id = %request.member_id, platform = request.platform.as_str(), content_id = %request.content_id)
    )]
    pub async fn record_share(&self, request: RecordShareRequest) -> Result<RecordShareResult> {
        let start = Instant::now();
        let result = self.record_share_inner(request).await;
        observe("record_share", &result, start);

        match &result {
            Ok(recorded) => {
                metrics::record_share_submission(
                    recorded.share.platform.as_str(),
                    recorded.share.status.as_str(),
                );
                if let Some(entry) = &recorded.entry {
                    metrics::record_points_credited(entry.transaction_type.as_str(), entry.amount);
                }
                info!(
                    share_id = %recorded.share.id,
                    status = recorded.share.status.as_str(),
                    points_awarded = recorded.share.points_awarded,
                    "Share recorded"
                );
            }
            Err(LedgerError::DuplicateShare { platform, .. }) => {
                metrics::record_share_submission(platform, "duplicate");
            }
            Err(_) => {}
        }

        result
    }

    async fn record_share_inner(&self, request: RecordShareRequest) -> Result<RecordShareResult> {
        let content_id = request.content_id.trim().to_string();
        if content_id.is_empty() {
            return Err(LedgerError::Validation("内容 ID 不能为空".to_string()));
        }

        let new_share = NewSocialShare {
            member_id: request.member_id,
            platform: request.platform,
            content_type: request.content_type,
            content_id,
            share_url: request.share_url,
        };
        let share_hash = new_share.fingerprint();

        let mut tx = self.store.begin().await?;
        ensure_member(tx.as_mut(), request.member_id).await?;

        if tx
            .find_share(request.member_id, request.platform, &share_hash)
            .await?
            .is_some()
        {
            return Err(LedgerError::DuplicateShare {
                member_id: request.member_id,
                platform: request.platform.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let mut share = new_share.into_share(ShareStatus::Pending, now);
        tx.insert_share(&share).await?;

        let entry = match self.config.share_verification_mode {
            ShareVerificationMode::Manual => None,
            ShareVerificationMode::Auto => {
                let entry = self
                    .grant_reward(tx.as_mut(), &share, ShareStatus::AutoVerified)
                    .await?;
                tx.mark_share(share.id, ShareStatus::AutoVerified, entry.amount, Some(now))
                    .await?;
                share.status = ShareStatus::AutoVerified;
                share.points_awarded = entry.amount;
                share.verified_at = Some(now);
                Some(entry)
            }
        };

        tx.commit().await?;

        Ok(RecordShareResult { share, entry })
    }

    /// 管理员审核分享
    ///
    /// 已审核的分享返回 `AlreadyVerified`，不会重复发放奖励
    #[instrument(
        skip(self, request),
        fields(share_id = %request.share_id, verified_by = %request.verified_by, approved = request.approved)
    )]
    pub async fn verify_share(&self, request: VerifyShareRequest) -> Result<VerifyShareResult> {
        let start = Instant::now();
        let result = self.verify_share_inner(request).await;
        observe("verify_share", &result, start);

        if let Ok(verified) = &result {
            metrics::record_share_verification(verified.verification.status.as_str());
            if let Some(entry) = &verified.entry {
                metrics::record_points_credited(entry.transaction_type.as_str(), entry.amount);
            }
            info!(
                status = verified.share.status.as_str(),
                points_awarded = verified.share.points_awarded,
                "Share verification recorded"
            );
        }

        result
    }

    async fn verify_share_inner(&self, request: VerifyShareRequest) -> Result<VerifyShareResult> {
        let rejection_reason = if request.approved {
            None
        } else {
            let reason = request
                .rejection_reason
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            if reason.is_empty() {
                return Err(LedgerError::Validation("驳回时必须填写原因".to_string()));
            }
            Some(reason.to_string())
        };

        let mut tx = self.store.begin().await?;

        let mut share = tx
            .get_share_for_update(request.share_id)
            .await?
            .ok_or(LedgerError::ShareNotFound(request.share_id))?;

        if share.is_verified() {
            return Err(LedgerError::AlreadyVerified(share.id));
        }

        let now = Utc::now();
        let verification = ShareVerification {
            id: Uuid::now_v7(),
            share_id: share.id,
            verification_method: request.verification_method,
            proof_url: request.proof_url,
            verified_by: request.verified_by,
            status: if request.approved {
                VerificationStatus::Approved
            } else {
                VerificationStatus::Rejected
            },
            rejection_reason,
            verified_at: now,
        };
        tx.insert_verification(&verification).await?;

        let entry = if request.approved {
            let entry = self
                .grant_reward(tx.as_mut(), &share, ShareStatus::AdminApproved)
                .await?;
            tx.mark_share(share.id, ShareStatus::AdminApproved, entry.amount, Some(now))
                .await?;
            share.status = ShareStatus::AdminApproved;
            share.points_awarded = entry.amount;
            share.verified_at = Some(now);
            Some(entry)
        } else {
            tx.mark_share(share.id, ShareStatus::AdminRejected, 0, None)
                .await?;
            share.status = ShareStatus::AdminRejected;
            share.points_awarded = 0;
            share.verified_at = None;
            None
        };
        share.updated_at = now;

        tx.commit().await?;

        Ok(VerifyShareResult {
            share,
            verification,
            entry,
        })
    }

    /// 发放分享奖励
    async fn grant_reward(
        &self,
        tx: &mut dyn PointsTx,
        share: &SocialShare,
        verification: ShareStatus,
    ) -> Result<LedgerEntry> {
        let change = PointsChange::new(
            share.member_id,
            self.config.share_reward,
            TransactionType::Earn,
            "share_reward",
        )
        .with_reference(ReferenceType::Share, share.id.to_string())
        .with_metadata(EntryMetadata::ShareReward {
            share_id: share.id,
            platform: share.platform,
            content_type: share.content_type,
            verification,
        });

        credit_in_tx(tx, &change).await
    }

    /// 查询会员的分享记录
    #[instrument(skip(self))]
    pub async fn list_member_shares(
        &self,
        member_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<SocialShare>> {
        if !self.store.member_exists(member_id).await? {
            return Err(LedgerError::MemberNotFound(member_id));
        }

        let max = self.config.ledger_page_limit.max(1);
        let limit = limit.unwrap_or(max).clamp(1, max);
        self.store.list_member_shares(member_id, limit).await
    }

    pub async fn get_share(&self, share_id: Uuid) -> Result<SocialShare> {
        self.store
            .get_share(share_id)
            .await?
            .ok_or(LedgerError::ShareNotFound(share_id))
    }

    /// 查询分享的审核记录（按审核时间正序）
    #[instrument(skip(self))]
    pub async fn list_share_verifications(&self, share_id: Uuid) -> Result<Vec<ShareVerification>> {
        if self.store.get_share(share_id).await?.is_none() {
            return Err(LedgerError::ShareNotFound(share_id));
        }
        self.store.list_share_verifications(share_id).await
    }
}
