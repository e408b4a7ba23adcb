//! 积分 API 处理器
//!
//! 余额与流水查询、内部系统入账出账、会员间转账

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::{
    ApiResponse, BalanceResponse, HistoryQuery, LedgerHistoryResponse, PointsChangeBody,
    TransferBody,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidatedJson;
use crate::api::identity::{AdminCaller, Caller, MemberCaller, ServiceCaller};
use crate::models::{EntryMetadata, LedgerEntry};
use crate::service::{PointsChange, TransferRequest, TransferResult};
use crate::state::AppState;

/// 查询会员余额
///
/// GET /api/v1/members/{id}/balance
pub async fn get_balance(
    State(state): State<AppState>,
    caller: Caller,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<BalanceResponse>>> {
    caller.ensure_can_read(member_id)?;

    let balance = state.ledger.get_balance(member_id).await?;
    Ok(Json(ApiResponse::success(BalanceResponse {
        member_id,
        balance,
    })))
}

/// 查询会员账本流水（最新在前）
///
/// GET /api/v1/members/{id}/ledger?limit=
pub async fn get_ledger(
    State(state): State<AppState>,
    caller: Caller,
    Path(member_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ApiResponse<LedgerHistoryResponse>>> {
    caller.ensure_can_read(member_id)?;
    query.validate()?;

    let entries = state
        .ledger
        .get_ledger_history(member_id, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(LedgerHistoryResponse {
        member_id,
        entries,
    })))
}

/// 关联对象的类型与 ID 必须同时提供或同时省略
fn to_points_change(body: PointsChangeBody) -> ApiResult<PointsChange> {
    let mut change = PointsChange::new(
        body.member_id,
        body.points,
        body.transaction_type,
        body.source,
    );
    match (body.reference_type, body.reference_id) {
        (Some(reference_type), Some(reference_id)) => {
            change = change.with_reference(reference_type, reference_id);
        }
        (None, None) => {}
        _ => {
            return Err(ApiError::Validation(
                "referenceType 与 referenceId 必须同时提供".to_string(),
            ));
        }
    }
    if body.note.is_some() {
        change = change.with_metadata(EntryMetadata::Plain { note: body.note });
    }
    Ok(change)
}

/// 内部系统入账
///
/// POST /api/v1/internal/points/credit
pub async fn credit_points(
    State(state): State<AppState>,
    ServiceCaller(service): ServiceCaller,
    ValidatedJson(body): ValidatedJson<PointsChangeBody>,
) -> ApiResult<Json<ApiResponse<LedgerEntry>>> {
    info!(caller = %service, member_id = %body.member_id, points = body.points, "积分入账请求");

    let entry = state.ledger.add_points(to_points_change(body)?).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// 内部系统出账
///
/// POST /api/v1/internal/points/debit
pub async fn debit_points(
    State(state): State<AppState>,
    ServiceCaller(service): ServiceCaller,
    ValidatedJson(body): ValidatedJson<PointsChangeBody>,
) -> ApiResult<Json<ApiResponse<LedgerEntry>>> {
    info!(caller = %service, member_id = %body.member_id, points = body.points, "积分出账请求");

    let entry = state.ledger.deduct_points(to_points_change(body)?).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// 会员转账，转出方为当前会员
///
/// POST /api/v1/points/transfer
pub async fn transfer_points(
    State(state): State<AppState>,
    MemberCaller(member_id): MemberCaller,
    ValidatedJson(body): ValidatedJson<TransferBody>,
) -> ApiResult<Json<ApiResponse<TransferResult>>> {
    let result = state
        .ledger
        .transfer_points(TransferRequest {
            from_member_id: member_id,
            to_member_id: body.to_member_id,
            points: body.points,
            reason: body.reason,
        })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// 按转账组查询转账双边流水
///
/// GET /api/v1/points/transfers/{group}
pub async fn get_transfer(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(transfer_group): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<TransferResult>>> {
    let result = state.ledger.get_transfer(transfer_group).await?;
    Ok(Json(ApiResponse::success(result)))
}
