//! 管理员 API 处理器
//!
//! 积分调整、兑换退还、账本审计、分享审核

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use crate::api::dto::{
    AdjustBody, ApiResponse, RefundBody, ShareDto, VerifyShareBody, VerifyShareResponse,
};
use crate::api::error::ApiResult;
use crate::api::extract::ValidatedJson;
use crate::api::identity::AdminCaller;
use crate::models::{AuditReport, LedgerEntry, ShareVerification};
use crate::service::{AdjustmentRequest, RefundRequest, VerifyShareRequest};
use crate::state::AppState;

/// 管理员积分调整
///
/// POST /api/v1/admin/points/adjust
pub async fn adjust_points(
    State(state): State<AppState>,
    AdminCaller(admin_id): AdminCaller,
    ValidatedJson(body): ValidatedJson<AdjustBody>,
) -> ApiResult<Json<ApiResponse<LedgerEntry>>> {
    info!(
        admin_id = %admin_id,
        member_id = %body.member_id,
        amount = body.amount,
        allow_negative = body.allow_negative,
        "管理员积分调整"
    );

    let entry = state
        .ledger
        .adjust_points(AdjustmentRequest {
            member_id: body.member_id,
            amount: body.amount,
            approved_by: admin_id,
            reason: body.reason,
            allow_negative: body.allow_negative,
        })
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// 兑换退还
///
/// POST /api/v1/admin/points/refunds
pub async fn refund_redemption(
    State(state): State<AppState>,
    AdminCaller(admin_id): AdminCaller,
    ValidatedJson(body): ValidatedJson<RefundBody>,
) -> ApiResult<Json<ApiResponse<LedgerEntry>>> {
    info!(
        admin_id = %admin_id,
        original_entry_id = body.original_entry_id,
        "兑换退还"
    );

    let entry = state
        .ledger
        .refund_redemption(RefundRequest {
            original_entry_id: body.original_entry_id,
            approved_by: admin_id,
            reason: body.reason,
        })
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// 会员账本审计
///
/// GET /api/v1/admin/members/{id}/audit
pub async fn audit_member(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AuditReport>>> {
    let report = state.ledger.audit_member(member_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// 查询分享详情
///
/// GET /api/v1/admin/shares/{id}
pub async fn get_share(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(share_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<ShareDto>>> {
    let share = state.shares.get_share(share_id).await?;
    Ok(Json(ApiResponse::success(share.into())))
}

/// 审核分享
///
/// POST /api/v1/admin/shares/{id}/verify
pub async fn verify_share(
    State(state): State<AppState>,
    AdminCaller(admin_id): AdminCaller,
    Path(share_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<VerifyShareBody>,
) -> ApiResult<Json<ApiResponse<VerifyShareResponse>>> {
    let result = state
        .shares
        .verify_share(VerifyShareRequest {
            share_id,
            verification_method: body.verification_method,
            proof_url: body.proof_url,
            verified_by: admin_id,
            approved: body.approved,
            rejection_reason: body.rejection_reason,
        })
        .await?;
    Ok(Json(ApiResponse::success(result.into())))
}

/// 查询分享的审核记录
///
/// GET /api/v1/admin/shares/{id}/verifications
pub async fn list_share_verifications(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(share_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<ShareVerification>>>> {
    let verifications = state.shares.list_share_verifications(share_id).await?;
    Ok(Json(ApiResponse::success(verifications)))
}
