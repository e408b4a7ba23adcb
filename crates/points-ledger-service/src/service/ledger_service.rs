//! 积分账本服务
//!
//! 入账、出账、转账是变更余额的唯一途径，每个操作在一个事务内完成：
//! 加锁 -> 读取最新余额 -> 计算新余额 -> 追加流水。
//!
//! ## 余额模型
//!
//! 不维护独立的余额字段，当前余额即最新一条流水的 balance_after。
//! 同一会员的并发操作由存储层的会员锁串行化。
//!
//! ## 转账
//!
//! 转账在同一事务内写入两条流水（出账方、入账方），两条流水共享 transfer_group，
//! 任一写入失败整体回滚。

use std::sync::Arc;
use std::time::Instant;

use engage_shared::config::PointsConfig;
use engage_shared::observability::metrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{AdjustmentRequest, PointsChange, RefundRequest, TransferRequest, TransferResult};
use super::observe;
use crate::error::{LedgerError, Result};
use crate::models::{
    AuditReport, EntryDirection, EntryMetadata, LedgerEntry, NewLedgerEntry, ReferenceType,
    TransactionType,
};
use crate::repository::{PointsStore, PointsTx};

/// 积分账本服务
pub struct LedgerService {
    store: Arc<dyn PointsStore>,
    config: PointsConfig,
}

impl LedgerService {
    pub fn new(store: Arc<dyn PointsStore>, config: PointsConfig) -> Self {
        Self { store, config }
    }

    /// 查询会员当前余额
    ///
    /// 无流水时为 0
    #[instrument(skip(self))]
    pub async fn get_balance(&self, member_id: Uuid) -> Result<i64> {
        if !self.store.member_exists(member_id).await? {
            return Err(LedgerError::MemberNotFound(member_id));
        }
        self.store.latest_balance(member_id).await
    }

    /// 积分入账
    #[instrument(
        skip(self, change),
        fields(member_id = %change.member_id, points = change.points, transaction_type = change.transaction_type.as_str())
    )]
    pub async fn add_points(&self, change: PointsChange) -> Result<LedgerEntry> {
        let start = Instant::now();
        let result = self.add_points_inner(&change).await;
        observe("add_points", &result, start);

        let entry = result?;
        metrics::record_points_credited(entry.transaction_type.as_str(), entry.amount);
        info!(
            entry_id = entry.id,
            balance_after = entry.balance_after,
            source = %entry.source,
            "Points credited"
        );
        Ok(entry)
    }

    async fn add_points_inner(&self, change: &PointsChange) -> Result<LedgerEntry> {
        let mut tx = self.store.begin().await?;
        let entry = credit_in_tx(tx.as_mut(), change).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// 积分出账
    ///
    /// 余额不足时失败，除非元数据为管理员覆盖
    #[instrument(
        skip(self, change),
        fields(member_id = %change.member_id, points = change.points, transaction_type = change.transaction_type.as_str())
    )]
    pub async fn deduct_points(&self, change: PointsChange) -> Result<LedgerEntry> {
        let start = Instant::now();
        let result = self.deduct_points_inner(&change).await;
        observe("deduct_points", &result, start);

        let entry = result?;
        metrics::record_points_debited(entry.transaction_type.as_str(), entry.amount);
        info!(
            entry_id = entry.id,
            balance_after = entry.balance_after,
            source = %entry.source,
            "Points debited"
        );
        Ok(entry)
    }

    async fn deduct_points_inner(&self, change: &PointsChange) -> Result<LedgerEntry> {
        let mut tx = self.store.begin().await?;
        let entry = debit_in_tx(tx.as_mut(), change).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// 管理员调整
    ///
    /// 正数入账，负数出账；出账且 allow_negative 时记为管理员覆盖，允许余额为负
    #[instrument(skip(self, request), fields(member_id = %request.member_id, amount = request.amount))]
    pub async fn adjust_points(&self, request: AdjustmentRequest) -> Result<LedgerEntry> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::Validation("调整原因不能为空".to_string()));
        }

        let points = request
            .amount
            .checked_abs()
            .ok_or(LedgerError::InvalidAmount(request.amount))?;

        let change = PointsChange::new(
            request.member_id,
            points,
            TransactionType::Adjustment,
            "admin_adjustment",
        )
        .with_reference(ReferenceType::Manual, request.approved_by.to_string());

        if request.amount > 0 {
            let change = change.with_metadata(EntryMetadata::Plain {
                note: Some(reason.to_string()),
            });
            return self.add_points(change).await;
        }

        let metadata = if request.allow_negative {
            EntryMetadata::AdministrativeOverride {
                approved_by: request.approved_by,
                reason: reason.to_string(),
            }
        } else {
            EntryMetadata::Plain {
                note: Some(reason.to_string()),
            }
        };
        self.deduct_points(change.with_metadata(metadata)).await
    }

    /// 会员间转账
    ///
    /// 出账方不允许透支，两条流水在同一事务内写入
    #[instrument(
        skip(self, request),
        fields(from = %request.from_member_id, to = %request.to_member_id, points = request.points)
    )]
    pub async fn transfer_points(&self, request: TransferRequest) -> Result<TransferResult> {
        let start = Instant::now();
        let result = self.transfer_points_inner(&request).await;
        observe("transfer_points", &result, start);

        let transfer = result?;
        metrics::record_points_debited(TransactionType::Transfer.as_str(), transfer.debit.amount);
        metrics::record_points_credited(TransactionType::Transfer.as_str(), transfer.credit.amount);
        info!(
            transfer_group = %transfer.transfer_group,
            sender_balance = transfer.debit.balance_after,
            recipient_balance = transfer.credit.balance_after,
            "Points transferred"
        );
        Ok(transfer)
    }

    async fn transfer_points_inner(&self, request: &TransferRequest) -> Result<TransferResult> {
        ensure_positive(request.points)?;
        if request.from_member_id == request.to_member_id {
            return Err(LedgerError::NoSelfTransfer);
        }

        let mut tx = self.store.begin().await?;
        ensure_member(tx.as_mut(), request.from_member_id).await?;
        ensure_member(tx.as_mut(), request.to_member_id).await?;
        tx.lock_members(&[request.from_member_id, request.to_member_id])
            .await?;

        let sender_balance = tx.latest_balance(request.from_member_id).await?;
        if sender_balance < request.points {
            return Err(LedgerError::InsufficientBalance {
                required: request.points,
                available: sender_balance,
            });
        }
        let recipient_balance = tx.latest_balance(request.to_member_id).await?;
        let recipient_after = checked_balance(recipient_balance, request.points)?;

        let transfer_group = Uuid::now_v7();
        let reason = request.reason.trim().to_string();

        let debit = tx
            .append_entry(&NewLedgerEntry {
                member_id: request.from_member_id,
                transaction_type: TransactionType::Transfer,
                source: "member_transfer".to_string(),
                amount: -request.points,
                balance_after: sender_balance - request.points,
                reference_type: Some(ReferenceType::Member),
                reference_id: Some(request.to_member_id.to_string()),
                transfer_group: Some(transfer_group),
                metadata: EntryMetadata::Transfer {
                    transfer_group,
                    counterpart_id: request.to_member_id,
                    direction: EntryDirection::Debit,
                    reason: reason.clone(),
                },
            })
            .await?;

        let credit = tx
            .append_entry(&NewLedgerEntry {
                member_id: request.to_member_id,
                transaction_type: TransactionType::Transfer,
                source: "member_transfer".to_string(),
                amount: request.points,
                balance_after: recipient_after,
                reference_type: Some(ReferenceType::Member),
                reference_id: Some(request.from_member_id.to_string()),
                transfer_group: Some(transfer_group),
                metadata: EntryMetadata::Transfer {
                    transfer_group,
                    counterpart_id: request.from_member_id,
                    direction: EntryDirection::Credit,
                    reason,
                },
            })
            .await?;

        tx.commit().await?;

        Ok(TransferResult {
            transfer_group,
            debit,
            credit,
        })
    }

    /// 查询转账的两条流水
    #[instrument(skip(self))]
    pub async fn get_transfer(&self, transfer_group: Uuid) -> Result<TransferResult> {
        let entries = self.store.list_transfer_entries(transfer_group).await?;

        let debit = entries
            .iter()
            .find(|e| e.direction() == EntryDirection::Debit)
            .cloned();
        let credit = entries
            .iter()
            .find(|e| e.direction() == EntryDirection::Credit)
            .cloned();

        match (debit, credit) {
            (Some(debit), Some(credit)) => Ok(TransferResult {
                transfer_group,
                debit,
                credit,
            }),
            _ => Err(LedgerError::LedgerEntryNotFound(transfer_group.to_string())),
        }
    }

    /// 查询流水（按时间倒序）
    ///
    /// limit 缺省或超出上限时取配置的单页上限
    #[instrument(skip(self))]
    pub async fn get_ledger_history(
        &self,
        member_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<LedgerEntry>> {
        if !self.store.member_exists(member_id).await? {
            return Err(LedgerError::MemberNotFound(member_id));
        }

        let max = self.config.ledger_page_limit.max(1);
        let limit = limit.unwrap_or(max).clamp(1, max);
        self.store.list_entries(member_id, limit).await
    }

    /// 审计会员余额链
    ///
    /// 只读，按需执行
    #[instrument(skip(self))]
    pub async fn audit_member(&self, member_id: Uuid) -> Result<AuditReport> {
        if !self.store.member_exists(member_id).await? {
            return Err(LedgerError::MemberNotFound(member_id));
        }

        let entries = self.store.list_entries_in_order(member_id).await?;
        let report = AuditReport::from_entries(member_id, &entries);

        if let Some(violation) = &report.violation {
            warn!(
                %member_id,
                entry_id = violation.entry_id,
                kind = ?violation.kind,
                expected = violation.expected_balance,
                recorded = violation.recorded_balance,
                "Ledger chain violation detected"
            );
        }

        Ok(report)
    }

    /// 兑换退还
    ///
    /// 履约失败的兑换经人工审核后，按原兑换流水的积分补偿入账。每条兑换流水只能退还一次。
    #[instrument(skip(self, request), fields(original_entry_id = request.original_entry_id))]
    pub async fn refund_redemption(&self, request: RefundRequest) -> Result<LedgerEntry> {
        let start = Instant::now();
        let result = self.refund_redemption_inner(&request).await;
        observe("refund_redemption", &result, start);

        let entry = result?;
        metrics::record_points_credited(entry.transaction_type.as_str(), entry.amount);
        info!(
            entry_id = entry.id,
            member_id = %entry.member_id,
            points = entry.amount,
            approved_by = %request.approved_by,
            "Redemption refunded"
        );
        Ok(entry)
    }

    async fn refund_redemption_inner(&self, request: &RefundRequest) -> Result<LedgerEntry> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::Validation("退还原因不能为空".to_string()));
        }

        let mut tx = self.store.begin().await?;

        let original = tx
            .get_entry(request.original_entry_id)
            .await?
            .ok_or_else(|| LedgerError::LedgerEntryNotFound(request.original_entry_id.to_string()))?;

        if original.transaction_type != TransactionType::Redeem {
            return Err(LedgerError::Validation(format!(
                "流水 {} 不是兑换流水，不能退还",
                original.id
            )));
        }

        // 先加锁再查重，并发退还同一流水时只有一笔成功
        tx.lock_members(&[original.member_id]).await?;

        let reference_id = original.id.to_string();
        let already_refunded = tx
            .find_entries_by_reference(ReferenceType::LedgerEntry, &reference_id)
            .await?
            .iter()
            .any(|e| e.transaction_type == TransactionType::Refund);
        if already_refunded {
            return Err(LedgerError::AlreadyRefunded(original.id));
        }

        let change = PointsChange::new(
            original.member_id,
            original.amount.abs(),
            TransactionType::Refund,
            "redemption_refund",
        )
        .with_reference(ReferenceType::LedgerEntry, reference_id)
        .with_metadata(EntryMetadata::Compensation {
            original_entry_id: original.id,
            reason: reason.to_string(),
            approved_by: request.approved_by,
        });

        let entry = credit_in_tx(tx.as_mut(), &change).await?;
        tx.commit().await?;
        Ok(entry)
    }
}

// ==================== 事务内操作 ====================

/// 在已开启的事务内入账
pub(crate) async fn credit_in_tx(
    tx: &mut dyn PointsTx,
    change: &PointsChange,
) -> Result<LedgerEntry> {
    ensure_positive(change.points)?;
    ensure_not_transfer(change.transaction_type)?;

    let metadata = change.metadata.clone().unwrap_or_default();
    metadata.ensure_admitted(change.transaction_type, EntryDirection::Credit)?;

    ensure_member(tx, change.member_id).await?;
    tx.lock_members(&[change.member_id]).await?;

    let current = tx.latest_balance(change.member_id).await?;
    let balance_after = checked_balance(current, change.points)?;

    tx.append_entry(&NewLedgerEntry {
        member_id: change.member_id,
        transaction_type: change.transaction_type,
        source: change.source.clone(),
        amount: change.points,
        balance_after,
        reference_type: change.reference_type,
        reference_id: change.reference_id.clone(),
        transfer_group: None,
        metadata,
    })
    .await
}

/// 在已开启的事务内出账
pub(crate) async fn debit_in_tx(
    tx: &mut dyn PointsTx,
    change: &PointsChange,
) -> Result<LedgerEntry> {
    ensure_positive(change.points)?;
    ensure_not_transfer(change.transaction_type)?;

    let metadata = change.metadata.clone().unwrap_or_default();
    metadata.ensure_admitted(change.transaction_type, EntryDirection::Debit)?;

    ensure_member(tx, change.member_id).await?;
    tx.lock_members(&[change.member_id]).await?;

    let current = tx.latest_balance(change.member_id).await?;
    let balance_after = current
        .checked_sub(change.points)
        .ok_or_else(|| LedgerError::Validation("积分余额超出下限".to_string()))?;

    if balance_after < 0 {
        if !metadata.is_override() {
            return Err(LedgerError::InsufficientBalance {
                required: change.points,
                available: current,
            });
        }
        warn!(
            member_id = %change.member_id,
            balance_after,
            "Administrative override drives balance negative"
        );
    }

    tx.append_entry(&NewLedgerEntry {
        member_id: change.member_id,
        transaction_type: change.transaction_type,
        source: change.source.clone(),
        amount: -change.points,
        balance_after,
        reference_type: change.reference_type,
        reference_id: change.reference_id.clone(),
        transfer_group: None,
        metadata,
    })
    .await
}

pub(crate) async fn ensure_member(tx: &mut dyn PointsTx, member_id: Uuid) -> Result<()> {
    if tx.member_exists(member_id).await? {
        Ok(())
    } else {
        Err(LedgerError::MemberNotFound(member_id))
    }
}

fn ensure_positive(points: i64) -> Result<()> {
    if points <= 0 {
        return Err(LedgerError::InvalidAmount(points));
    }
    Ok(())
}

fn ensure_not_transfer(transaction_type: TransactionType) -> Result<()> {
    if transaction_type == TransactionType::Transfer {
        return Err(LedgerError::Validation(
            "转账流水只能通过转账操作成对写入".to_string(),
        ));
    }
    Ok(())
}

fn checked_balance(current: i64, points: i64) -> Result<i64> {
    current
        .checked_add(points)
        .ok_or_else(|| LedgerError::Validation("积分余额超出上限".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Carrier, ProductType};
    use crate::repository::{MemoryPointsStore, MockPointsStore};

    async fn setup() -> (LedgerService, MemoryPointsStore, Uuid) {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();
        store.register_member(member).await;
        let service = LedgerService::new(Arc::new(store.clone()), PointsConfig::default());
        (service, store, member)
    }

    fn earn(member_id: Uuid, points: i64) -> PointsChange {
        PointsChange::new(member_id, points, TransactionType::Earn, "event_attendance")
    }

    fn redeem(member_id: Uuid, points: i64) -> PointsChange {
        PointsChange::new(member_id, points, TransactionType::Redeem, "redemption")
            .with_reference(ReferenceType::Redemption, "RD20250101000000000001")
            .with_metadata(EntryMetadata::Redemption {
                fulfillment_reference: "RD20250101000000000001".to_string(),
                product_type: ProductType::Airtime,
                carrier: Carrier::Mtn,
                value: points / 10,
                recipient: "0803****567".to_string(),
            })
    }

    #[tokio::test]
    async fn test_add_points_updates_balance() {
        let (service, _, member) = setup().await;

        let entry = service.add_points(earn(member, 50)).await.unwrap();
        assert_eq!(entry.amount, 50);
        assert_eq!(entry.balance_after, 50);
        assert_eq!(entry.metadata, EntryMetadata::default());
        assert_eq!(service.get_balance(member).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_add_points_rejects_non_positive() {
        let (service, store, member) = setup().await;

        for points in [0, -5] {
            let err = service.add_points(earn(member, points)).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(p) if p == points));
        }
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_points_unknown_member() {
        let (service, _, _) = setup().await;
        let stranger = Uuid::now_v7();

        let err = service.add_points(earn(stranger, 10)).await.unwrap_err();
        assert!(matches!(err, LedgerError::MemberNotFound(id) if id == stranger));
        assert!(service.get_balance(stranger).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_metadata_must_match_transaction_type() {
        let (service, _, member) = setup().await;

        let bogus = PointsChange::new(member, 10, TransactionType::Redeem, "redemption");
        let err = service.deduct_points(bogus).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let transfer = PointsChange::new(member, 10, TransactionType::Transfer, "manual");
        let err = service.add_points(transfer).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_deduct_insufficient_balance() {
        let (service, store, member) = setup().await;
        service.add_points(earn(member, 60)).await.unwrap();

        let err = service.deduct_points(redeem(member, 100)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                required: 100,
                available: 60
            }
        ));
        assert_eq!(service.get_balance(member).await.unwrap(), 60);
        assert_eq!(store.entry_count().await, 1);

        let entry = service.deduct_points(redeem(member, 60)).await.unwrap();
        assert_eq!(entry.amount, -60);
        assert_eq!(entry.balance_after, 0);
    }

    #[tokio::test]
    async fn test_adjustment_override_allows_negative() {
        let (service, _, member) = setup().await;
        let admin = Uuid::now_v7();
        service.add_points(earn(member, 20)).await.unwrap();

        let plain = AdjustmentRequest {
            member_id: member,
            amount: -50,
            approved_by: admin,
            reason: "duplicate reward".to_string(),
            allow_negative: false,
        };
        let err = service.adjust_points(plain.clone()).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        let entry = service
            .adjust_points(AdjustmentRequest {
                allow_negative: true,
                ..plain
            })
            .await
            .unwrap();
        assert_eq!(entry.balance_after, -30);
        assert!(entry.metadata.is_override());
        assert_eq!(service.get_balance(member).await.unwrap(), -30);

        let report = service.audit_member(member).await.unwrap();
        assert!(report.consistent);
    }

    #[tokio::test]
    async fn test_adjustment_requires_reason_and_amount() {
        let (service, _, member) = setup().await;
        let request = AdjustmentRequest {
            member_id: member,
            amount: 0,
            approved_by: Uuid::now_v7(),
            reason: "fix".to_string(),
            allow_negative: false,
        };
        assert!(matches!(
            service.adjust_points(request.clone()).await.unwrap_err(),
            LedgerError::InvalidAmount(0)
        ));

        let request = AdjustmentRequest {
            amount: 10,
            reason: "  ".to_string(),
            ..request
        };
        assert!(matches!(
            service.adjust_points(request).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_override_debit_rejects_balance_underflow() {
        let (service, store, member) = setup().await;
        let admin = Uuid::now_v7();
        let request = AdjustmentRequest {
            member_id: member,
            amount: -2,
            approved_by: admin,
            reason: "chargeback".to_string(),
            allow_negative: true,
        };
        service.adjust_points(request.clone()).await.unwrap();

        let err = service
            .adjust_points(AdjustmentRequest {
                amount: -i64::MAX,
                ..request
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        assert_eq!(service.get_balance(member).await.unwrap(), -2);
        assert_eq!(store.list_entries_in_order(member).await.unwrap().len(), 1);
        assert!(service.audit_member(member).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn test_transfer_moves_points() {
        let (service, store, sender) = setup().await;
        let recipient = Uuid::now_v7();
        store.register_member(recipient).await;
        service.add_points(earn(sender, 150)).await.unwrap();

        let transfer = service
            .transfer_points(TransferRequest {
                from_member_id: sender,
                to_member_id: recipient,
                points: 100,
                reason: "thanks".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(transfer.debit.amount, -100);
        assert_eq!(transfer.credit.amount, 100);
        assert_eq!(transfer.debit.transfer_group, Some(transfer.transfer_group));
        assert_eq!(transfer.credit.transfer_group, Some(transfer.transfer_group));
        assert_eq!(service.get_balance(sender).await.unwrap(), 50);
        assert_eq!(service.get_balance(recipient).await.unwrap(), 100);

        let fetched = service.get_transfer(transfer.transfer_group).await.unwrap();
        assert_eq!(fetched.debit.id, transfer.debit.id);
        assert_eq!(fetched.credit.id, transfer.credit.id);
    }

    #[tokio::test]
    async fn test_transfer_failures() {
        let (service, store, sender) = setup().await;
        let recipient = Uuid::now_v7();
        store.register_member(recipient).await;
        service.add_points(earn(sender, 50)).await.unwrap();

        let request = TransferRequest {
            from_member_id: sender,
            to_member_id: sender,
            points: 10,
            reason: String::new(),
        };
        assert!(matches!(
            service.transfer_points(request.clone()).await.unwrap_err(),
            LedgerError::NoSelfTransfer
        ));

        let missing = Uuid::now_v7();
        let err = service
            .transfer_points(TransferRequest {
                to_member_id: missing,
                ..request.clone()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MemberNotFound(id) if id == missing));

        let err = service
            .transfer_points(TransferRequest {
                to_member_id: recipient,
                points: 51,
                ..request
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        assert_eq!(service.get_balance(sender).await.unwrap(), 50);
        assert_eq!(service.get_balance(recipient).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_transfer_unknown_group() {
        let (service, _, _) = setup().await;
        let err = service.get_transfer(Uuid::now_v7()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_clamped() {
        let store = MemoryPointsStore::new();
        let member = Uuid::now_v7();
        store.register_member(member).await;
        let service = LedgerService::new(
            Arc::new(store),
            PointsConfig {
                ledger_page_limit: 3,
                ..Default::default()
            },
        );

        for points in 1..=5 {
            service.add_points(earn(member, points)).await.unwrap();
        }

        let history = service.get_ledger_history(member, Some(100)).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].amount, 5);
        assert_eq!(history[0].balance_after, 15);

        let history = service.get_ledger_history(member, Some(0)).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_refund_redemption_once() {
        let (service, _, member) = setup().await;
        let admin = Uuid::now_v7();
        service.add_points(earn(member, 100)).await.unwrap();
        let redeemed = service.deduct_points(redeem(member, 80)).await.unwrap();

        let request = RefundRequest {
            original_entry_id: redeemed.id,
            approved_by: admin,
            reason: "carrier outage".to_string(),
        };
        let refund = service.refund_redemption(request.clone()).await.unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(refund.amount, 80);
        assert_eq!(refund.balance_after, 100);
        assert_eq!(refund.reference_type, Some(ReferenceType::LedgerEntry));
        assert_eq!(refund.reference_id, Some(redeemed.id.to_string()));

        let err = service.refund_redemption(request).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyRefunded(id) if id == redeemed.id));
        assert_eq!(service.get_balance(member).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_refund_rejects_non_redeem_and_missing() {
        let (service, _, member) = setup().await;
        let earned = service.add_points(earn(member, 10)).await.unwrap();

        let err = service
            .refund_redemption(RefundRequest {
                original_entry_id: earned.id,
                approved_by: Uuid::now_v7(),
                reason: "oops".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = service
            .refund_redemption(RefundRequest {
                original_entry_id: 9_999,
                approved_by: Uuid::now_v7(),
                reason: "oops".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::LedgerEntryNotFound(_)));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockPointsStore::new();
        store
            .expect_begin()
            .returning(|| Err(LedgerError::Database(sqlx::Error::PoolTimedOut)));

        let service = LedgerService::new(Arc::new(store), PointsConfig::default());
        let err = service.add_points(earn(Uuid::now_v7(), 10)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Database(_)));
        assert!(err.is_retryable());
    }
}
