//! 兑换相关实体定义
//!
//! 积分兑换话费/流量，账本只负责扣减，履约由外部服务完成

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Carrier, ProductType};
use super::ledger::LedgerEntry;

/// 尼日利亚手机号：0 或 +234/234 开头，第二段 7/8/9 + 0/1，后接 8 位
static NG_MSISDN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+?234|0)[789][01]\d{8}$").expect("valid phone regex")
});

/// 兑换报价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionQuote {
    pub product_type: ProductType,
    pub carrier: Carrier,
    /// 面值（奈拉）
    pub value: i64,
    /// 每单位面值所需积分
    pub rate: i64,
    pub points_needed: i64,
}

/// 提交给履约服务的订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentOrder {
    pub reference: String,
    pub member_id: Uuid,
    pub ledger_entry_id: i64,
    pub product_type: ProductType,
    pub carrier: Carrier,
    pub value: i64,
    pub recipient_phone: String,
}

/// 履约状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// 已提交至履约服务
    Submitted,
    /// 已入队，等待履约服务拉取
    Queued,
    /// 提交失败，扣减已生效，需人工审核后退还
    Failed,
}

/// 兑换结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionResult {
    pub fulfillment_reference: String,
    pub quote: RedemptionQuote,
    pub entry: LedgerEntry,
    pub fulfillment: FulfillmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_error: Option<String>,
}

/// 生成履约单号
///
/// 格式：RD + yyyyMMddHHmmss + 6 位随机数
pub fn generate_fulfillment_reference() -> String {
    let now = Utc::now();
    let random = Uuid::new_v4().as_u128() % 1_000_000;
    format!("RD{}{:06}", now.format("%Y%m%d%H%M%S"), random)
}

/// 校验尼日利亚手机号
pub fn is_valid_phone(phone: &str) -> bool {
    NG_MSISDN.is_match(phone)
}

/// 手机号脱敏，保留前 4 位和后 3 位
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 7 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 7), tail)
}
