//! 社交分享与审核记录实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::enums::{ContentType, Platform, ShareStatus, VerificationMethod, VerificationStatus};

/// 社交分享记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SocialShare {
    pub id: Uuid,
    pub member_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub content_id: String,
    pub share_url: Option<String>,
    /// 去重指纹
    pub share_hash: String,
    pub status: ShareStatus,
    pub points_awarded: i64,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialShare {
    /// 是否已审核（已发放奖励）
    pub fn is_verified(&self) -> bool {
        self.status.is_verified()
    }
}

/// 待写入的分享记录
#[derive(Debug, Clone, PartialEq)]
pub struct NewSocialShare {
    pub member_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub content_id: String,
    pub share_url: Option<String>,
}

impl NewSocialShare {
    pub fn fingerprint(&self) -> String {
        share_fingerprint(
            self.member_id,
            self.platform,
            self.content_type,
            &self.content_id,
        )
    }

    /// 构造初始记录，状态由审核模式决定
    pub fn into_share(self, status: ShareStatus, now: DateTime<Utc>) -> SocialShare {
        let share_hash = self.fingerprint();
        SocialShare {
            id: Uuid::now_v7(),
            member_id: self.member_id,
            platform: self.platform,
            content_type: self.content_type,
            content_id: self.content_id,
            share_url: self.share_url,
            share_hash,
            status,
            points_awarded: 0,
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 分享去重指纹
///
/// SHA-256(member_id:platform:content_type:content_id)，十六进制小写。
/// content_id 去除首尾空白后参与计算。
pub fn share_fingerprint(
    member_id: Uuid,
    platform: Platform,
    content_type: ContentType,
    content_id: &str,
) -> String {
    let input = format!(
        "{}:{}:{}:{}",
        member_id,
        platform.as_str(),
        content_type.as_str(),
        content_id.trim()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// 分享审核记录
///
/// 每次管理员审核追加一条，不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShareVerification {
    pub id: Uuid,
    pub share_id: Uuid,
    pub verification_method: VerificationMethod,
    pub proof_url: Option<String>,
    pub verified_by: Uuid,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub verified_at: DateTime<Utc>,
}
