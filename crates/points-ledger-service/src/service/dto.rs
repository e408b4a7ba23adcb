//! 服务层数据传输对象

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Carrier, ContentType, EntryMetadata, LedgerEntry, Platform, ProductType, ReferenceType,
    ShareVerification, SocialShare, TransactionType, VerificationMethod,
};

/// 单边积分变动（入账或出账）
#[derive(Debug, Clone, PartialEq)]
pub struct PointsChange {
    pub member_id: Uuid,
    /// 变动数量，必须为正数，方向由调用的操作决定
    pub points: i64,
    pub transaction_type: TransactionType,
    pub source: String,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    /// 缺省为 plain
    pub metadata: Option<EntryMetadata>,
}

impl PointsChange {
    pub fn new(
        member_id: Uuid,
        points: i64,
        transaction_type: TransactionType,
        source: impl Into<String>,
    ) -> Self {
        Self {
            member_id,
            points,
            transaction_type,
            source: source.into(),
            reference_type: None,
            reference_id: None,
            metadata: None,
        }
    }

    pub fn with_reference(
        mut self,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type);
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// 管理员调整
///
/// amount 为正入账、为负出账；allow_negative 仅对出账生效，记为管理员覆盖
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentRequest {
    pub member_id: Uuid,
    pub amount: i64,
    pub approved_by: Uuid,
    pub reason: String,
    pub allow_negative: bool,
}

/// 转账请求
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub points: i64,
    pub reason: String,
}

/// 转账结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub transfer_group: Uuid,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

/// 兑换退还请求
#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    pub original_entry_id: i64,
    pub approved_by: Uuid,
    pub reason: String,
}

/// 分享提交请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShareRequest {
    pub member_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub content_id: String,
    pub share_url: Option<String>,
}

/// 分享提交结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordShareResult {
    pub share: SocialShare,
    /// 自动审核模式下的奖励流水
    pub entry: Option<LedgerEntry>,
}

/// 分享审核请求
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyShareRequest {
    pub share_id: Uuid,
    pub verification_method: VerificationMethod,
    pub proof_url: Option<String>,
    pub verified_by: Uuid,
    pub approved: bool,
    pub rejection_reason: Option<String>,
}

/// 分享审核结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyShareResult {
    pub share: SocialShare,
    pub verification: ShareVerification,
    /// 审核通过时的奖励流水
    pub entry: Option<LedgerEntry>,
}

/// 兑换请求
#[derive(Debug, Clone, PartialEq)]
pub struct RedeemRequest {
    pub member_id: Uuid,
    pub product_type: ProductType,
    pub carrier: Carrier,
    pub value: i64,
    pub recipient_phone: String,
}
