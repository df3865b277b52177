//! 双提交 CSRF 校验
//!
//! 令牌在会话创建时生成，只在登录响应体中下发一次；Cookie 本身无法推导出令牌。
//! 除 GET/HEAD/OPTIONS 外的请求必须通过 `X-CSRF-Token` 头回传该令牌。

use axum::http::{HeaderMap, Method};

use crate::token::constant_time_eq;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// 该方法是否需要 CSRF 令牌
pub fn requires_token(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// 读取请求头中的 CSRF 令牌
pub fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 校验请求是否满足 CSRF 要求
pub fn verify(method: &Method, provided: Option<&str>, expected: &str) -> bool {
    if !requires_token(method) {
        return true;
    }
    match provided {
        Some(token) if !token.is_empty() && !expected.is_empty() => {
            constant_time_eq(token, expected)
        }
        _ => false,
    }
}
