//! 调用方身份提取
//!
//! 认证由上游网关完成，网关以请求头传入已认证的身份：
//! - `X-Member-Id`: 会员 ID
//! - `X-Admin-Id`: 管理员 ID
//! - `X-Service-Name`: 内部调用方服务名

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use super::error::ApiError;

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const ADMIN_ID_HEADER: &str = "x-admin-id";
pub const SERVICE_NAME_HEADER: &str = "x-service-name";

/// 会员身份
#[derive(Debug, Clone, Copy)]
pub struct MemberCaller(pub Uuid);

/// 管理员身份
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller(pub Uuid);

/// 内部服务身份
#[derive(Debug, Clone)]
pub struct ServiceCaller(pub String);

/// 只读接口的调用方：会员本人或管理员
#[derive(Debug, Clone, Copy)]
pub enum Caller {
    Member(Uuid),
    Admin(Uuid),
}

impl Caller {
    /// 会员只能读取自己的数据，管理员可读取任意会员
    pub fn ensure_can_read(&self, member_id: Uuid) -> Result<(), ApiError> {
        match self {
            Self::Admin(_) => Ok(()),
            Self::Member(id) if *id == member_id => Ok(()),
            Self::Member(_) => Err(ApiError::Forbidden("只能查询本人数据".to_string())),
        }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| ApiError::Unauthorized(format!("{} 格式不正确", name)))
}

impl<S> FromRequestParts<S> for MemberCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_uuid(parts, MEMBER_ID_HEADER)?
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("缺少会员身份".to_string()))
    }
}

impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_uuid(parts, ADMIN_ID_HEADER)?
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("缺少管理员身份".to_string()))
    }
}

impl<S> FromRequestParts<S> for ServiceCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SERVICE_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("缺少调用方服务名".to_string()))
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(admin) = header_uuid(parts, ADMIN_ID_HEADER)? {
            return Ok(Self::Admin(admin));
        }
        header_uuid(parts, MEMBER_ID_HEADER)?
            .map(Self::Member)
            .ok_or_else(|| ApiError::Unauthorized("缺少调用方身份".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_member_caller() {
        let id = Uuid::now_v7();
        let mut p = parts(&[(MEMBER_ID_HEADER, &id.to_string())]);
        let caller = MemberCaller::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(caller.0, id);

        let mut p = parts(&[]);
        assert!(matches!(
            MemberCaller::from_request_parts(&mut p, &()).await,
            Err(ApiError::Unauthorized(_))
        ));

        let mut p = parts(&[(MEMBER_ID_HEADER, "not-a-uuid")]);
        assert!(MemberCaller::from_request_parts(&mut p, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_caller_prefers_admin() {
        let admin = Uuid::now_v7();
        let member = Uuid::now_v7();
        let mut p = parts(&[
            (ADMIN_ID_HEADER, &admin.to_string()),
            (MEMBER_ID_HEADER, &member.to_string()),
        ]);
        let caller = Caller::from_request_parts(&mut p, &()).await.unwrap();
        assert!(matches!(caller, Caller::Admin(id) if id == admin));
    }

    #[test]
    fn test_read_permission() {
        let me = Uuid::now_v7();
        let other = Uuid::now_v7();
        assert!(Caller::Member(me).ensure_can_read(me).is_ok());
        assert!(matches!(
            Caller::Member(me).ensure_can_read(other),
            Err(ApiError::Forbidden(_))
        ));
        assert!(Caller::Admin(me).ensure_can_read(other).is_ok());
    }

    #[tokio::test]
    async fn test_service_caller() {
        let mut p = parts(&[(SERVICE_NAME_HEADER, "event-checkin")]);
        let caller = ServiceCaller::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(caller.0, "event-checkin");

        let mut p = parts(&[(SERVICE_NAME_HEADER, "  ")]);
        assert!(ServiceCaller::from_request_parts(&mut p, &()).await.is_err());
    }
}
