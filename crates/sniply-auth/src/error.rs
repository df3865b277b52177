use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 认证统一错误类型
///
/// 各子系统的错误在 [`crate::AuthService`] 边界归一化为该类型；
/// `Internal` 只携带面向客户端的通用描述，底层原因通过 tracing 记录。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    RateLimited { message: String, retry_after: Duration },

    #[error("{0}")]
    Internal(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AuthError::InvalidInput(msg.into())
    }

    pub fn unauthorized() -> Self {
        AuthError::Unauthorized("unauthorized".to_string())
    }

    pub fn forbidden() -> Self {
        AuthError::Forbidden("forbidden".to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AuthError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AuthError::Internal(msg.into())
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        AuthError::RateLimited {
            message: "too many requests".to_string(),
            retry_after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidInput(_) => ErrorKind::InvalidInput,
            AuthError::Unauthorized(_) => ErrorKind::Unauthorized,
            AuthError::Forbidden(_) => ErrorKind::Forbidden,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::RateLimited { .. } => ErrorKind::RateLimited,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AuthError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Retry-After 秒数，向上取整且至少为 1
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let mut secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.max(1)
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.kind().status();
        let retry_after = self.retry_after();

        let body = Json(json!({
            "error": self.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let Some(retry_after) = retry_after {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_to_status() {
        assert_eq!(
            AuthError::unauthorized().kind().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::forbidden().kind().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::invalid_input("bad").kind().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Conflict("dup".into()).kind().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::internal("boom").kind().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_retry_after_rounds_up_with_minimum() {
        assert_eq!(retry_after_secs(Duration::from_millis(0)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(200)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(42)), 42);
    }

    #[test]
    fn test_rate_limited_response_sets_retry_after() {
        let response = AuthError::rate_limited(Duration::from_secs(30)).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = AuthError::invalid_input("invalid email").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "invalid email" }));
    }

    #[test]
    fn test_non_rate_limited_response_has_no_retry_after() {
        let response = AuthError::forbidden().into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
