//! HTTP 层错误类型
//!
//! 将业务错误映射为 HTTP 状态码和统一响应体

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::LedgerError;

/// HTTP 层错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("禁止访问: {0}")]
    Forbidden(String),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(err) => match err {
                LedgerError::MemberNotFound(_)
                | LedgerError::ShareNotFound(_)
                | LedgerError::LedgerEntryNotFound(_) => StatusCode::NOT_FOUND,

                LedgerError::InvalidAmount(_)
                | LedgerError::NoSelfTransfer
                | LedgerError::Validation(_) => StatusCode::BAD_REQUEST,

                LedgerError::InsufficientBalance { .. }
                | LedgerError::DuplicateShare { .. }
                | LedgerError::AlreadyVerified(_)
                | LedgerError::AlreadyRefunded(_)
                | LedgerError::ConcurrencyConflict => StatusCode::CONFLICT,

                LedgerError::Fulfillment(_) => StatusCode::BAD_GATEWAY,

                LedgerError::Database(_)
                | LedgerError::Serialization(_)
                | LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Ledger(err) => err.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Ledger(err) if !err.is_business_error() => {
                tracing::error!(error = %err, code = err.error_code(), "请求处理失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
