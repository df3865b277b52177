//! 凭证识别与分派
//!
//! 与 HTTP 框架无关：从请求头识别凭证类型，再交给对应的认证策略。

use axum::http::{header, HeaderMap, Method};

use super::{AuthMethod, AuthService, Principal};
use crate::csrf;
use crate::error::{AuthError, Result};
use crate::session::{CookieConfig, Session};

pub const API_KEY_HEADER: &str = "x-api-key";

/// 路由允许的认证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOptions {
    pub allow_api_key: bool,
    pub allow_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            allow_api_key: true,
            allow_session: true,
        }
    }
}

impl AuthOptions {
    pub fn session_only() -> Self {
        Self {
            allow_api_key: false,
            allow_session: true,
        }
    }

    pub fn api_key_only() -> Self {
        Self {
            allow_api_key: true,
            allow_session: false,
        }
    }
}

/// 请求携带的凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Session {
        session_id: String,
        csrf_token: Option<String>,
    },
    Missing,
}

impl Credential {
    /// 按路由选项识别凭证，API key 优先于会话
    pub fn from_headers(headers: &HeaderMap, cookie: &CookieConfig, options: AuthOptions) -> Self {
        if options.allow_api_key {
            if let Some(token) = api_key_token(headers) {
                return Credential::ApiKey(token);
            }
        }

        if options.allow_session {
            if let Some(session_id) = cookie.read(headers) {
                return Credential::Session {
                    session_id,
                    csrf_token: csrf::header_token(headers),
                };
            }
        }

        Credential::Missing
    }
}

/// 从 `X-API-Key` 或 `Authorization: Bearer` 读取 API key
pub fn api_key_token(headers: &HeaderMap) -> Option<String> {
    let dedicated = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(token) = dedicated {
        return Some(token.to_string());
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .trim();
    let (scheme, token) = authorization.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

/// 认证结果
#[derive(Debug, Clone)]
pub struct Authentication {
    pub principal: Principal,
    pub method: AuthMethod,
    /// 已续期的会话，需要重写 Cookie
    pub refreshed_session: Option<Session>,
}

impl AuthService {
    /// 按凭证类型分派到对应的认证策略
    pub async fn authenticate(&self, credential: Credential, method: &Method) -> Result<Authentication> {
        match credential {
            Credential::ApiKey(token) => {
                let principal = self.authenticate_api_key(&token, method).await?;
                Ok(Authentication {
                    principal,
                    method: AuthMethod::ApiKey,
                    refreshed_session: None,
                })
            }
            Credential::Session {
                session_id,
                csrf_token,
            } => {
                let auth = self
                    .authenticate_session(&session_id, method, csrf_token.as_deref())
                    .await?;
                Ok(Authentication {
                    principal: auth.principal,
                    method: AuthMethod::Session,
                    refreshed_session: auth.refreshed.then_some(auth.session),
                })
            }
            Credential::Missing => Err(AuthError::unauthorized()),
        }
    }
}
