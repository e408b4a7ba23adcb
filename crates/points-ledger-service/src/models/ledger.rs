//! 积分账本实体定义
//!
//! 账本流水只追加不修改，balance_after 是变动后的余额快照

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    Carrier, ContentType, EntryDirection, Platform, ProductType, ReferenceType, ShareStatus,
    TransactionType,
};
use crate::error::{LedgerError, Result};

/// 账本流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub member_id: Uuid,
    pub transaction_type: TransactionType,
    /// 来源标签，如 event_attendance、share_reward
    pub source: String,
    /// 变动数量，正数入账，负数出账
    pub amount: i64,
    pub balance_after: i64,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    /// 转账关联 ID，同一笔转账的两条流水共享
    pub transfer_group: Option<Uuid>,
    #[sqlx(json)]
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn direction(&self) -> EntryDirection {
        EntryDirection::of_amount(self.amount)
    }
}

/// 待写入的账本流水
///
/// id 与 created_at 由存储层分配
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub member_id: Uuid,
    pub transaction_type: TransactionType,
    pub source: String,
    pub amount: i64,
    pub balance_after: i64,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub transfer_group: Option<Uuid>,
    pub metadata: EntryMetadata,
}

/// 流水元数据
///
/// 按交易类型区分的结构化元数据，以 kind 字段区分，落库为 JSONB。
/// 管理员覆盖是独立的种类，不依赖约定的字符串键。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryMetadata {
    Plain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    ShareReward {
        share_id: Uuid,
        platform: Platform,
        content_type: ContentType,
        /// 发放奖励时分享进入的状态
        verification: ShareStatus,
    },
    Transfer {
        transfer_group: Uuid,
        counterpart_id: Uuid,
        direction: EntryDirection,
        reason: String,
    },
    Redemption {
        fulfillment_reference: String,
        product_type: ProductType,
        carrier: Carrier,
        value: i64,
        /// 脱敏后的收货手机号
        recipient: String,
    },
    Compensation {
        original_entry_id: i64,
        reason: String,
        approved_by: Uuid,
    },
    /// 管理员覆盖：允许余额为负，永久留痕
    AdministrativeOverride { approved_by: Uuid, reason: String },
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self::Plain { note: None }
    }
}

impl EntryMetadata {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "plain",
            Self::ShareReward { .. } => "share_reward",
            Self::Transfer { .. } => "transfer",
            Self::Redemption { .. } => "redemption",
            Self::Compensation { .. } => "compensation",
            Self::AdministrativeOverride { .. } => "administrative_override",
        }
    }

    /// 是否允许余额为负
    pub fn is_override(&self) -> bool {
        matches!(self, Self::AdministrativeOverride { .. })
    }

    /// 校验元数据种类与交易类型、方向是否匹配
    ///
    /// | 交易类型 | 方向 | 允许的元数据 |
    /// |---|---|---|
    /// | earn | 入账 | plain, share_reward |
    /// | adjustment | 入账/出账 | plain, administrative_override（仅出账）|
    /// | redeem | 出账 | redemption |
    /// | refund | 入账 | compensation |
    /// | transfer | 入账/出账 | transfer（方向一致）|
    pub fn ensure_admitted(
        &self,
        transaction_type: TransactionType,
        direction: EntryDirection,
    ) -> Result<()> {
        use EntryDirection::{Credit, Debit};
        use TransactionType::*;

        let admitted = match (transaction_type, direction, self) {
            (Earn, Credit, Self::Plain { .. } | Self::ShareReward { .. }) => true,
            (Adjustment, _, Self::Plain { .. }) => true,
            (Adjustment, Debit, Self::AdministrativeOverride { .. }) => true,
            (Redeem, Debit, Self::Redemption { .. }) => true,
            (Refund, Credit, Self::Compensation { .. }) => true,
            (Transfer, dir, Self::Transfer { direction, .. }) => dir == *direction,
            _ => false,
        };

        if admitted {
            Ok(())
        } else {
            Err(LedgerError::Validation(format!(
                "交易类型 {} ({:?}) 不允许携带 {} 元数据",
                transaction_type.as_str(),
                direction,
                self.kind()
            )))
        }
    }
}

/// 余额链违规类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// balance_after 与上一条余额加本条变动不符
    BrokenChain,
    /// 余额为负且未标记管理员覆盖
    UnflaggedNegative,
}

/// 余额链违规
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainViolation {
    pub entry_id: i64,
    pub kind: ViolationKind,
    pub expected_balance: i64,
    pub recorded_balance: i64,
}

/// 会员账本审计报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub member_id: Uuid,
    pub entry_count: usize,
    /// 全部流水变动之和
    pub ledger_sum: i64,
    /// 最新一条流水的余额快照
    pub latest_balance: i64,
    pub consistent: bool,
    /// 第一处违规
    pub violation: Option<ChainViolation>,
}

impl AuditReport {
    /// 按写入顺序重放流水，检查余额链
    ///
    /// entries 必须按 id 升序排列
    pub fn from_entries(member_id: Uuid, entries: &[LedgerEntry]) -> Self {
        let mut running = 0i64;
        let mut violation = None;

        for entry in entries {
            let expected = running.checked_add(entry.amount);

            if violation.is_some() {
                running = expected.unwrap_or(entry.balance_after);
                continue;
            }

            if expected != Some(entry.balance_after) {
                // 溢出同样视为断链
                violation = Some(ChainViolation {
                    entry_id: entry.id,
                    kind: ViolationKind::BrokenChain,
                    expected_balance: running.saturating_add(entry.amount),
                    recorded_balance: entry.balance_after,
                });
                // 后续按记录值继续累计，只报告第一处
                running = entry.balance_after;
            } else {
                running = entry.balance_after;
                if running < 0 && !entry.metadata.is_override() {
                    violation = Some(ChainViolation {
                        entry_id: entry.id,
                        kind: ViolationKind::UnflaggedNegative,
                        expected_balance: running,
                        recorded_balance: entry.balance_after,
                    });
                }
            }
        }

        Self {
            member_id,
            entry_count: entries.len(),
            ledger_sum: entries
                .iter()
                .fold(0i64, |sum, e| sum.saturating_add(e.amount)),
            latest_balance: entries.last().map(|e| e.balance_after).unwrap_or(0),
            consistent: violation.is_none(),
            violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: i64, amount: i64, balance_after: i64, metadata: EntryMetadata) -> LedgerEntry {
        LedgerEntry {
            id,
            member_id: Uuid::nil(),
            transaction_type: TransactionType::Adjustment,
            source: "test".to_string(),
            amount,
            balance_after,
            reference_type: None,
            reference_id: None,
            transfer_group: None,
            metadata,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_metadata_json_shape() {
        let approver = Uuid::nil();
        let metadata = EntryMetadata::AdministrativeOverride {
            approved_by: approver,
            reason: "chargeback".to_string(),
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "administrative_override",
                "approved_by": approver,
                "reason": "chargeback"
            })
        );

        let plain = serde_json::to_value(EntryMetadata::default()).unwrap();
        assert_eq!(plain, json!({ "kind": "plain" }));
    }

    #[test]
    fn test_metadata_admission_table() {
        use EntryDirection::{Credit, Debit};

        let plain = EntryMetadata::default();
        let override_ = EntryMetadata::AdministrativeOverride {
            approved_by: Uuid::nil(),
            reason: "fix".to_string(),
        };

        assert!(plain.ensure_admitted(TransactionType::Earn, Credit).is_ok());
        assert!(plain.ensure_admitted(TransactionType::Earn, Debit).is_err());
        assert!(plain.ensure_admitted(TransactionType::Adjustment, Debit).is_ok());
        assert!(plain.ensure_admitted(TransactionType::Redeem, Debit).is_err());
        assert!(override_.ensure_admitted(TransactionType::Adjustment, Debit).is_ok());
        assert!(override_.ensure_admitted(TransactionType::Adjustment, Credit).is_err());
        assert!(override_.ensure_admitted(TransactionType::Earn, Credit).is_err());

        let transfer = EntryMetadata::Transfer {
            transfer_group: Uuid::nil(),
            counterpart_id: Uuid::nil(),
            direction: Debit,
            reason: "gift".to_string(),
        };
        assert!(transfer.ensure_admitted(TransactionType::Transfer, Debit).is_ok());
        assert!(transfer.ensure_admitted(TransactionType::Transfer, Credit).is_err());
    }

    #[test]
    fn test_audit_consistent_chain() {
        let entries = vec![
            entry(1, 50, 50, EntryMetadata::default()),
            entry(2, 10, 60, EntryMetadata::default()),
            entry(3, -60, 0, EntryMetadata::default()),
        ];
        let report = AuditReport::from_entries(Uuid::nil(), &entries);
        assert!(report.consistent);
        assert_eq!(report.entry_count, 3);
        assert_eq!(report.ledger_sum, 0);
        assert_eq!(report.latest_balance, 0);
    }

    #[test]
    fn test_audit_reports_first_break() {
        let entries = vec![
            entry(1, 50, 50, EntryMetadata::default()),
            entry(2, 10, 70, EntryMetadata::default()),
            entry(3, 5, 80, EntryMetadata::default()),
        ];
        let report = AuditReport::from_entries(Uuid::nil(), &entries);
        let violation = report.violation.unwrap();
        assert_eq!(violation.entry_id, 2);
        assert_eq!(violation.kind, ViolationKind::BrokenChain);
        assert_eq!(violation.expected_balance, 60);
        assert_eq!(violation.recorded_balance, 70);
    }

    #[test]
    fn test_audit_flags_wrapped_balance() {
        let entries = vec![
            entry(
                1,
                -2,
                -2,
                EntryMetadata::AdministrativeOverride {
                    approved_by: Uuid::nil(),
                    reason: "chargeback".to_string(),
                },
            ),
            entry(2, -i64::MAX, i64::MAX, EntryMetadata::default()),
        ];
        let report = AuditReport::from_entries(Uuid::nil(), &entries);
        assert!(!report.consistent);
        let violation = report.violation.unwrap();
        assert_eq!(violation.entry_id, 2);
        assert_eq!(violation.kind, ViolationKind::BrokenChain);
        assert_eq!(violation.expected_balance, i64::MIN);
        assert_eq!(report.ledger_sum, i64::MIN);
    }

    #[test]
    fn test_audit_negative_balance_requires_override() {
        let unflagged = vec![entry(1, -5, -5, EntryMetadata::default())];
        let report = AuditReport::from_entries(Uuid::nil(), &unflagged);
        assert_eq!(
            report.violation.unwrap().kind,
            ViolationKind::UnflaggedNegative
        );

        let flagged = vec![entry(
            1,
            -5,
            -5,
            EntryMetadata::AdministrativeOverride {
                approved_by: Uuid::nil(),
                reason: "clawback".to_string(),
            },
        )];
        assert!(AuditReport::from_entries(Uuid::nil(), &flagged).consistent);
    }

    #[test]
    fn test_audit_empty_ledger() {
        let report = AuditReport::from_entries(Uuid::nil(), &[]);
        assert!(report.consistent);
        assert_eq!(report.latest_balance, 0);
    }
}
