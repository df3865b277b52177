use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::{AuthOptions, AuthService, Credential};
use crate::session::CookieConfig;

/// 认证中间件状态
#[derive(Clone)]
pub struct AuthGuard {
    pub service: Arc<AuthService>,
    pub cookie: CookieConfig,
    pub options: AuthOptions,
}

/// 认证中间件
///
/// 成功时把 [`super::Principal`] 和 [`super::AuthMethod`] 注入 request extensions；
/// 失败时直接返回错误响应，不会进入 handler。
pub async fn require_auth(State(guard): State<AuthGuard>, mut req: Request, next: Next) -> Response {
    let credential = Credential::from_headers(req.headers(), &guard.cookie, guard.options);
    let method = req.method().clone();

    let auth = match guard.service.authenticate(credential, &method).await {
        Ok(auth) => auth,
        Err(e) => {
            debug!(method = %method, uri = %req.uri(), error = %e, "Request rejected");
            return e.into_response();
        }
    };

    req.extensions_mut().insert(auth.principal);
    req.extensions_mut().insert(auth.method);

    let mut response = next.run(req).await;

    // 续期后重写 Cookie
    if let Some(session) = auth.refreshed_session {
        let now = guard.service.sessions().now();
        if let Some(cookie) = guard.cookie.write(&session.id, session.expires_at, now) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }

    response
}
