//! HTTP API 层
//!
//! - `error`: HTTP 错误映射与统一错误响应
//! - `identity`: 网关注入的调用方身份
//! - `extract`: 带校验的请求体提取器
//! - `dto`: 请求与响应结构
//! - `handlers`: 各端点处理器
//! - `routes`: 路由装配

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::build_router;
