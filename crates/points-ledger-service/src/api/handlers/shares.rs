//! 分享 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::{ApiResponse, HistoryQuery, RecordShareBody, RecordShareResponse, ShareDto};
use crate::api::error::ApiResult;
use crate::api::extract::ValidatedJson;
use crate::api::identity::{Caller, MemberCaller};
use crate::service::RecordShareRequest;
use crate::state::AppState;

/// 提交分享
///
/// POST /api/v1/shares
pub async fn record_share(
    State(state): State<AppState>,
    MemberCaller(member_id): MemberCaller,
    ValidatedJson(body): ValidatedJson<RecordShareBody>,
) -> ApiResult<Json<ApiResponse<RecordShareResponse>>> {
    let result = state
        .shares
        .record_share(RecordShareRequest {
            member_id,
            platform: body.platform,
            content_type: body.content_type,
            content_id: body.content_id,
            share_url: body.share_url,
        })
        .await?;
    Ok(Json(ApiResponse::success(result.into())))
}

/// 查询会员的分享记录
///
/// GET /api/v1/members/{id}/shares?limit=
pub async fn list_member_shares(
    State(state): State<AppState>,
    caller: Caller,
    Path(member_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ShareDto>>>> {
    caller.ensure_can_read(member_id)?;
    query.validate()?;

    let shares = state
        .shares
        .list_member_shares(member_id, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(
        shares.into_iter().map(ShareDto::from).collect(),
    )))
}
