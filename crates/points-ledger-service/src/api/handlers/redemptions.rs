//! 兑换 API 处理器
//!
//! 话费、流量兑换的报价与下单

use axum::{Json, extract::State};

use crate::api::dto::{ApiResponse, QuoteBody, RedeemBody};
use crate::api::error::ApiResult;
use crate::api::extract::ValidatedJson;
use crate::api::identity::MemberCaller;
use crate::models::{RedemptionQuote, RedemptionResult};
use crate::service::RedeemRequest;
use crate::state::AppState;

/// 兑换报价
///
/// POST /api/v1/redemptions/quote
pub async fn quote(
    State(state): State<AppState>,
    _member: MemberCaller,
    ValidatedJson(body): ValidatedJson<QuoteBody>,
) -> ApiResult<Json<ApiResponse<RedemptionQuote>>> {
    let quote = state
        .redemptions
        .quote(body.product_type, body.carrier, body.value)?;
    Ok(Json(ApiResponse::success(quote)))
}

/// 兑换下单
///
/// 履约失败时仍返回成功响应，`fulfillment` 为 failed，扣减不回滚
///
/// POST /api/v1/redemptions
pub async fn redeem(
    State(state): State<AppState>,
    MemberCaller(member_id): MemberCaller,
    ValidatedJson(body): ValidatedJson<RedeemBody>,
) -> ApiResult<Json<ApiResponse<RedemptionResult>>> {
    let result = state
        .redemptions
        .redeem(RedeemRequest {
            member_id,
            product_type: body.product_type,
            carrier: body.carrier,
            value: body.value,
            recipient_phone: body.recipient_phone,
        })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
