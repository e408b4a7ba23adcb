//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现：`PointsStore` 提供只读查询和开启事务，
//! `PointsTx` 封装必须在同一事务内完成的读写。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    LedgerEntry, NewLedgerEntry, Platform, ReferenceType, ShareStatus, ShareVerification,
    SocialShare,
};

/// 积分存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PointsStore: Send + Sync {
    /// 开启事务
    async fn begin(&self) -> Result<Box<dyn PointsTx>>;

    async fn member_exists(&self, member_id: Uuid) -> Result<bool>;

    /// 最新一条流水的余额快照，无流水时为 0
    async fn latest_balance(&self, member_id: Uuid) -> Result<i64>;

    /// 按时间倒序列出流水
    async fn list_entries(&self, member_id: Uuid, limit: i64) -> Result<Vec<LedgerEntry>>;

    /// 按写入顺序列出全部流水（审计用）
    async fn list_entries_in_order(&self, member_id: Uuid) -> Result<Vec<LedgerEntry>>;

    async fn list_transfer_entries(&self, transfer_group: Uuid) -> Result<Vec<LedgerEntry>>;

    async fn get_share(&self, share_id: Uuid) -> Result<Option<SocialShare>>;

    async fn list_member_shares(&self, member_id: Uuid, limit: i64) -> Result<Vec<SocialShare>>;

    async fn list_share_verifications(&self, share_id: Uuid) -> Result<Vec<ShareVerification>>;
}

/// 积分事务接口
///
/// `commit` 消费事务；未提交即 drop 时回滚
#[async_trait]
pub trait PointsTx: Send {
    async fn member_exists(&mut self, member_id: Uuid) -> Result<bool>;

    /// 按会员加锁，事务结束时释放
    ///
    /// 实现须按 member_id 升序加锁，避免转账双方互相等待
    async fn lock_members(&mut self, member_ids: &[Uuid]) -> Result<()>;

    async fn latest_balance(&mut self, member_id: Uuid) -> Result<i64>;

    async fn append_entry(&mut self, entry: &NewLedgerEntry) -> Result<LedgerEntry>;

    async fn get_entry(&mut self, entry_id: i64) -> Result<Option<LedgerEntry>>;

    async fn find_entries_by_reference(
        &mut self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> Result<Vec<LedgerEntry>>;

    async fn find_share(
        &mut self,
        member_id: Uuid,
        platform: Platform,
        share_hash: &str,
    ) -> Result<Option<SocialShare>>;

    /// 写入分享，指纹冲突时返回 `DuplicateShare`
    async fn insert_share(&mut self, share: &SocialShare) -> Result<()>;

    /// 读取并锁定分享行
    async fn get_share_for_update(&mut self, share_id: Uuid) -> Result<Option<SocialShare>>;

    async fn mark_share(
        &mut self,
        share_id: Uuid,
        status: ShareStatus,
        points_awarded: i64,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// 写入审核记录，重复通过时返回 `AlreadyVerified`
    async fn insert_verification(&mut self, verification: &ShareVerification) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
