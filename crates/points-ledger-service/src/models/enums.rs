//! 积分账本枚举类型定义
//!
//! 落库的枚举同时支持数据库（sqlx）和 JSON（serde）序列化，统一使用 snake_case

use serde::{Deserialize, Serialize};

/// 积分交易类型
///
/// 每种交易类型限定了方向和允许携带的元数据种类，见 `EntryMetadata::ensure_admitted`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum TransactionType {
    /// 获取（+）- 活动签到、任务完成、分享奖励等
    Earn,
    /// 兑换消耗（-）- 兑换话费/流量
    Redeem,
    /// 转账（±）- 会员之间转移积分，成对出现
    Transfer,
    /// 调整（±）- 运营后台修正
    Adjustment,
    /// 退还（+）- 兑换履约失败后的人工补偿
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Redeem => "redeem",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
            Self::Refund => "refund",
        }
    }
}

/// 资金方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryDirection {
    Credit,
    Debit,
}

impl EntryDirection {
    pub fn of_amount(amount: i64) -> Self {
        if amount < 0 { Self::Debit } else { Self::Credit }
    }
}

/// 关联类型
///
/// 标识积分变动的触发来源，用于追溯和审计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ReferenceType {
    Share,
    Task,
    Event,
    Referral,
    Dues,
    /// 转账对手方会员
    Member,
    /// 兑换履约单号
    Redemption,
    /// 另一条账本流水（退还引用原兑换流水）
    LedgerEntry,
    Manual,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Share => "share",
            Self::Task => "task",
            Self::Event => "event",
            Self::Referral => "referral",
            Self::Dues => "dues",
            Self::Member => "member",
            Self::Redemption => "redemption",
            Self::LedgerEntry => "ledger_entry",
            Self::Manual => "manual",
        }
    }
}

/// 社交平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Twitter,
    Whatsapp,
    Linkedin,
    Instagram,
    Telegram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Twitter => "twitter",
            Self::Whatsapp => "whatsapp",
            Self::Linkedin => "linkedin",
            Self::Instagram => "instagram",
            Self::Telegram => "telegram",
        }
    }
}

/// 被分享的内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ContentType {
    News,
    Event,
    Campaign,
    Election,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Event => "event",
            Self::Campaign => "campaign",
            Self::Election => "election",
        }
    }
}

/// 分享审核状态
///
/// 一条分享只能经由一条路径进入已审核：
/// - 自动模式：Pending 不出现，提交即为 AutoVerified
/// - 人工模式：Pending -> AdminApproved，或 Pending -> AdminRejected -> ...（可再次审核）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ShareStatus {
    #[default]
    Pending,
    AutoVerified,
    AdminApproved,
    AdminRejected,
}

impl ShareStatus {
    /// 是否已审核（已发放奖励）
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::AutoVerified | Self::AdminApproved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AutoVerified => "auto_verified",
            Self::AdminApproved => "admin_approved",
            Self::AdminRejected => "admin_rejected",
        }
    }
}

/// 审核方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum VerificationMethod {
    /// 截图凭证
    Screenshot,
    /// 核对分享链接
    LinkCheck,
    /// 平台 API 核验
    PlatformApi,
    /// 人工判断，无凭证
    Manual,
}

/// 审核结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum VerificationStatus {
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// 兑换商品类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Airtime,
    Data,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Airtime => "airtime",
            Self::Data => "data",
        }
    }
}

/// 运营商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    Mtn,
    Airtel,
    Glo,
    #[serde(rename = "9mobile")]
    NineMobile,
}

impl Carrier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mtn => "mtn",
            Self::Airtel => "airtel",
            Self::Glo => "glo",
            Self::NineMobile => "9mobile",
        }
    }
}
