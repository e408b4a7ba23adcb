//! 内存积分存储
//!
//! 用于测试和本地开发。所有事务在同一把锁上串行执行，事务内操作一份状态副本，
//! 提交时整体替换，drop 时丢弃副本即回滚。与数据库一致地检查分享指纹唯一、
//! 单次审核通过和余额非负约束。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::traits::{PointsStore, PointsTx};
use crate::error::{LedgerError, Result};
use crate::models::{
    LedgerEntry, NewLedgerEntry, Platform, ReferenceType, ShareStatus, ShareVerification,
    SocialShare, VerificationStatus,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    members: HashSet<Uuid>,
    /// 按写入顺序保存，下标 + 1 即流水 ID
    entries: Vec<LedgerEntry>,
    shares: HashMap<Uuid, SocialShare>,
    verifications: Vec<ShareVerification>,
}

impl MemoryState {
    fn latest_balance(&self, member_id: Uuid) -> i64 {
        self.entries
            .iter()
            .rev()
            .find(|e| e.member_id == member_id)
            .map(|e| e.balance_after)
            .unwrap_or(0)
    }
}

/// 内存积分存储
#[derive(Clone, Default)]
pub struct MemoryPointsStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPointsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册会员（会员数据归属外部系统，这里只记录存在性）
    pub async fn register_member(&self, member_id: Uuid) {
        self.state.lock().await.members.insert(member_id);
    }

    /// 全部流水条数
    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

#[async_trait]
impl PointsStore for MemoryPointsStore {
    async fn begin(&self) -> Result<Box<dyn PointsTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryPointsTx { guard, working }))
    }

    async fn member_exists(&self, member_id: Uuid) -> Result<bool> {
        Ok(self.state.lock().await.members.contains(&member_id))
    }

    async fn latest_balance(&self, member_id: Uuid) -> Result<i64> {
        Ok(self.state.lock().await.latest_balance(member_id))
    }

    async fn list_entries(&self, member_id: Uuid, limit: i64) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.member_id == member_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_entries_in_order(&self, member_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn list_transfer_entries(&self, transfer_group: Uuid) -> Result<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.transfer_group == Some(transfer_group))
            .cloned()
            .collect())
    }

    async fn get_share(&self, share_id: Uuid) -> Result<Option<SocialShare>> {
        Ok(self.state.lock().await.shares.get(&share_id).cloned())
    }

    async fn list_member_shares(&self, member_id: Uuid, limit: i64) -> Result<Vec<SocialShare>> {
        let state = self.state.lock().await;
        let mut shares: Vec<SocialShare> = state
            .shares
            .values()
            .filter(|s| s.member_id == member_id)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        shares.truncate(limit.max(0) as usize);
        Ok(shares)
    }

    async fn list_share_verifications(&self, share_id: Uuid) -> Result<Vec<ShareVerification>> {
        let state = self.state.lock().await;
        Ok(state
            .verifications
            .iter()
            .filter(|v| v.share_id == share_id)
            .cloned()
            .collect())
    }
}

/// 内存积分事务
pub struct MemoryPointsTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl PointsTx for MemoryPointsTx {
    async fn member_exists(&mut self, member_id: Uuid) -> Result<bool> {
        Ok(self.working.members.contains(&member_id))
    }

    async fn lock_members(&mut self, _member_ids: &[Uuid]) -> Result<()> {
        // 事务持有全局锁
        Ok(())
    }

    async fn latest_balance(&mut self, member_id: Uuid) -> Result<i64> {
        Ok(self.working.latest_balance(member_id))
    }

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        if entry.amount == 0 {
            return Err(LedgerError::Internal(
                "违反约束: point_ledger.amount 不能为 0".to_string(),
            ));
        }
        if entry.balance_after < 0 && !entry.metadata.is_override() {
            return Err(LedgerError::Internal(
                "违反约束: chk_point_ledger_balance".to_string(),
            ));
        }

        let created = LedgerEntry {
            id: self.working.entries.len() as i64 + 1,
            member_id: entry.member_id,
            transaction_type: entry.transaction_type,
            source: entry.source.clone(),
            amount: entry.amount,
            balance_after: entry.balance_after,
            reference_type: entry.reference_type,
            reference_id: entry.reference_id.clone(),
            transfer_group: entry.transfer_group,
            metadata: entry.metadata.clone(),
            created_at: Utc::now(),
        };
        self.working.entries.push(created.clone());

        Ok(created)
    }

    async fn get_entry(&mut self, entry_id: i64) -> Result<Option<LedgerEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .cloned())
    }

    async fn find_entries_by_reference(
        &mut self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| {
                e.reference_type == Some(reference_type)
                    && e.reference_id.as_deref() == Some(reference_id)
            })
            .cloned()
            .collect())
    }

    async fn find_share(
        &mut self,
        member_id: Uuid,
        platform: Platform,
        share_hash: &str,
    ) -> Result<Option<SocialShare>> {
        Ok(self
            .working
            .shares
            .values()
            .find(|s| {
                s.member_id == member_id && s.platform == platform && s.share_hash == share_hash
            })
            .cloned())
    }

    async fn insert_share(&mut self, share: &SocialShare) -> Result<()> {
        let duplicate = self.working.shares.values().any(|s| {
            s.member_id == share.member_id
                && s.platform == share.platform
                && s.share_hash == share.share_hash
        });
        if duplicate {
            return Err(LedgerError::DuplicateShare {
                member_id: share.member_id,
                platform: share.platform.as_str().to_string(),
            });
        }

        self.working.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn get_share_for_update(&mut self, share_id: Uuid) -> Result<Option<SocialShare>> {
        Ok(self.working.shares.get(&share_id).cloned())
    }

    async fn mark_share(
        &mut self,
        share_id: Uuid,
        status: ShareStatus,
        points_awarded: i64,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let share = self
            .working
            .shares
            .get_mut(&share_id)
            .ok_or(LedgerError::ShareNotFound(share_id))?;

        share.status = status;
        share.points_awarded = points_awarded;
        share.verified_at = verified_at;
        share.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_verification(&mut self, verification: &ShareVerification) -> Result<()> {
        if !self.working.shares.contains_key(&verification.share_id) {
            return Err(LedgerError::ShareNotFound(verification.share_id));
        }

        let already_approved = verification.status == VerificationStatus::Approved
            && self.working.verifications.iter().any(|v| {
                v.share_id == verification.share_id && v.status == VerificationStatus::Approved
            });
        if already_approved {
            return Err(LedgerError::AlreadyVerified(verification.share_id));
        }

        self.working.verifications.push(verification.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryPointsTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryMetadata, TransactionType};

    fn credit(member_id: Uuid, amount: i64, balance_after: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            member_id,
            transaction_type: TransactionType::Earn,
            source: "test".to_string(),
            amount,
            balance_after,
            reference_type: None,
            reference_id: None,
            transfer_group: None,
            metadata: EntryMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_entries() {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();

        let mut tx = store.begin().await.unwrap();
        let entry = tx.append_entry(&credit(member, 50, 50)).await.unwrap();
        assert_eq!(entry.id, 1);
        tx.commit().await.unwrap();

        assert_eq!(store.latest_balance(member).await.unwrap(), 50);
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();

        {
            let mut tx = store.begin().await.unwrap();
            tx.append_entry(&credit(member, 50, 50)).await.unwrap();
        }

        assert_eq!(store.latest_balance(member).await.unwrap(), 0);
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_negative_balance_requires_override() {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();
        let mut tx = store.begin().await.unwrap();

        let mut debit = credit(member, -10, -10);
        debit.transaction_type = TransactionType::Adjustment;
        assert!(tx.append_entry(&debit).await.is_err());

        debit.metadata = EntryMetadata::AdministrativeOverride {
            approved_by: Uuid::now_v7(),
            reason: "clawback".to_string(),
        };
        assert!(tx.append_entry(&debit).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_member() {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();
        assert!(!store.member_exists(member).await.unwrap());

        store.register_member(member).await;
        assert!(store.member_exists(member).await.unwrap());

        let mut tx = store.begin().await.unwrap();
        assert!(tx.member_exists(member).await.unwrap());
    }
}
