//! 积分账本领域模型
//!
//! 包含账本流水、社交分享、审核记录和兑换相关的实体定义

pub mod enums;
pub mod ledger;
pub mod redemption;
pub mod share;

// 重新导出常用类型
pub use enums::{
    Carrier, ContentType, EntryDirection, Platform, ProductType, ReferenceType, ShareStatus,
    TransactionType, VerificationMethod, VerificationStatus,
};
pub use ledger::{
    AuditReport, ChainViolation, EntryMetadata, LedgerEntry, NewLedgerEntry, ViolationKind,
};
pub use redemption::{
    FulfillmentOrder, FulfillmentStatus, RedemptionQuote, RedemptionResult,
    generate_fulfillment_reference, is_valid_phone, mask_phone,
};
pub use share::{NewSocialShare, ShareVerification, SocialShare, share_fingerprint};
