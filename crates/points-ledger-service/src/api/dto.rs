//! HTTP 请求与响应 DTO
//!
//! 请求体统一使用 camelCase，并通过 validator 做字段校验

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Carrier, ContentType, LedgerEntry, Platform, ProductType, ReferenceType, ShareStatus,
    SocialShare, TransactionType, VerificationMethod,
};
use crate::service::{RecordShareResult, VerifyShareResult};

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }
}

// ==================== 请求 ====================

/// 内部系统入账/出账请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PointsChangeBody {
    pub member_id: Uuid,
    #[validate(range(min = 1, message = "积分数量必须为正数"))]
    pub points: i64,
    pub transaction_type: TransactionType,
    #[validate(length(min = 1, max = 64, message = "来源长度应在 1-64 个字符"))]
    pub source: String,
    pub reference_type: Option<ReferenceType>,
    #[validate(length(max = 128, message = "关联 ID 不能超过 128 个字符"))]
    pub reference_id: Option<String>,
    #[validate(length(max = 500, message = "备注不能超过 500 个字符"))]
    pub note: Option<String>,
}

/// 会员转账请求，转出方为当前会员
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub to_member_id: Uuid,
    #[validate(range(min = 1, message = "转账积分必须为正数"))]
    pub points: i64,
    #[validate(length(min = 1, max = 500, message = "转账原因长度应在 1-500 个字符"))]
    pub reason: String,
}

/// 分享提交请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordShareBody {
    pub platform: Platform,
    pub content_type: ContentType,
    #[validate(length(min = 1, max = 128, message = "内容 ID 长度应在 1-128 个字符"))]
    pub content_id: String,
    #[validate(url(message = "分享链接格式不正确"))]
    pub share_url: Option<String>,
}

/// 兑换报价请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    pub product_type: ProductType,
    pub carrier: Carrier,
    #[validate(range(min = 1, message = "面值必须为正数"))]
    pub value: i64,
}

/// 兑换请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemBody {
    pub product_type: ProductType,
    pub carrier: Carrier,
    #[validate(range(min = 1, message = "面值必须为正数"))]
    pub value: i64,
    #[validate(length(min = 1, max = 20, message = "手机号不能为空"))]
    pub recipient_phone: String,
}

/// 管理员调整请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBody {
    pub member_id: Uuid,
    /// 正数入账，负数出账
    pub amount: i64,
    #[validate(length(min = 1, max = 500, message = "调整原因长度应在 1-500 个字符"))]
    pub reason: String,
    #[serde(default)]
    pub allow_negative: bool,
}

/// 兑换退还请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundBody {
    #[validate(range(min = 1, message = "流水 ID 必须为正数"))]
    pub original_entry_id: i64,
    #[validate(length(min = 1, max = 500, message = "退还原因长度应在 1-500 个字符"))]
    pub reason: String,
}

/// 分享审核请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyShareBody {
    pub approved: bool,
    pub verification_method: VerificationMethod,
    #[validate(url(message = "凭证链接格式不正确"))]
    pub proof_url: Option<String>,
    #[validate(length(max = 500, message = "驳回原因不能超过 500 个字符"))]
    pub rejection_reason: Option<String>,
}

/// 列表查询参数
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[validate(range(min = 1, message = "limit 必须为正数"))]
    pub limit: Option<i64>,
}

// ==================== 响应 ====================

/// 余额响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub member_id: Uuid,
    pub balance: i64,
}

/// 账本历史响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHistoryResponse {
    pub member_id: Uuid,
    pub entries: Vec<LedgerEntry>,
}

/// 分享 DTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDto {
    pub id: Uuid,
    pub member_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub content_id: String,
    pub share_url: Option<String>,
    pub status: ShareStatus,
    pub verified: bool,
    pub points_awarded: i64,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SocialShare> for ShareDto {
    fn from(share: SocialShare) -> Self {
        Self {
            verified: share.is_verified(),
            id: share.id,
            member_id: share.member_id,
            platform: share.platform,
            content_type: share.content_type,
            content_id: share.content_id,
            share_url: share.share_url,
            status: share.status,
            points_awarded: share.points_awarded,
            verified_at: share.verified_at,
            created_at: share.created_at,
        }
    }
}

/// 分享提交响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordShareResponse {
    pub share: ShareDto,
    pub points_awarded: i64,
    pub entry: Option<LedgerEntry>,
}

impl From<RecordShareResult> for RecordShareResponse {
    fn from(result: RecordShareResult) -> Self {
        Self {
            points_awarded: result.share.points_awarded,
            share: result.share.into(),
            entry: result.entry,
        }
    }
}

/// 分享审核响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyShareResponse {
    pub share: ShareDto,
    pub verification_id: Uuid,
    pub entry: Option<LedgerEntry>,
}

impl From<VerifyShareResult> for VerifyShareResponse {
    fn from(result: VerifyShareResult) -> Self {
        Self {
            share: result.share.into(),
            verification_id: result.verification.id,
            entry: result.entry,
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}
