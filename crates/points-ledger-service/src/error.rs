//! 积分账本服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use thiserror::Error;
use uuid::Uuid;

/// 积分账本服务错误类型
#[derive(Debug, Error)]
pub enum LedgerError {
    // === 资源不存在 ===
    #[error("会员不存在: {0}")]
    MemberNotFound(Uuid),

    #[error("分享记录不存在: {0}")]
    ShareNotFound(Uuid),

    #[error("账本流水不存在: {0}")]
    LedgerEntryNotFound(String),

    // === 积分相关错误 ===
    #[error("积分数量必须为正数: {0}")]
    InvalidAmount(i64),

    #[error("积分余额不足: 需要 {required}, 可用 {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("不能向自己转账")]
    NoSelfTransfer,

    #[error("兑换流水已退还: entry_id={0}")]
    AlreadyRefunded(i64),

    // === 分享相关错误 ===
    #[error("重复的分享: member_id={member_id}, platform={platform}")]
    DuplicateShare { member_id: Uuid, platform: String },

    #[error("分享已审核: {0}")]
    AlreadyVerified(Uuid),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("履约服务错误: {0}")]
    Fulfillment(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,
}

/// 积分账本服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Fulfillment(_) | Self::ConcurrencyConflict
        )
    }

    /// 检查是否为资源不存在错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MemberNotFound(_) | Self::ShareNotFound(_) | Self::LedgerEntryNotFound(_)
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::Fulfillment(_)
                | Self::Internal(_)
                | Self::ConcurrencyConflict
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MemberNotFound(_) => "MEMBER_NOT_FOUND",
            Self::ShareNotFound(_) => "SHARE_NOT_FOUND",
            Self::LedgerEntryNotFound(_) => "LEDGER_ENTRY_NOT_FOUND",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::NoSelfTransfer => "NO_SELF_TRANSFER",
            Self::AlreadyRefunded(_) => "ALREADY_REFUNDED",
            Self::DuplicateShare { .. } => "DUPLICATE_SHARE",
            Self::AlreadyVerified(_) => "ALREADY_VERIFIED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Fulfillment(_) => "FULFILLMENT_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }
}
