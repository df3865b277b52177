//! 认证相关 HTTP 端点

use axum::{
    body::{to_bytes, Bytes},
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::warn;

use crate::apikey::{ApiKey, Scope};
use crate::auth::{require_auth, AuthOptions, Principal};
use crate::error::{AuthError, Result};
use crate::state::AuthState;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_expires_at: DateTime<Utc>,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateApiKeyResponse {
    pub id: String,
    pub name: String,
    pub scope: Scope,
    pub token: String,
    pub token_prefix: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub scope: Scope,
    pub token_prefix: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            scope: key.scope,
            token_prefix: key.token_prefix,
            created_at: key.created_at,
            revoked_at: key.revoked_at,
        }
    }
}

/// 认证路由
///
/// API key 管理端点只接受会话认证。
pub fn router(state: AuthState) -> Router {
    let api_keys = Router::new()
        .route("/auth/api-keys", post(create_api_key).get(list_api_keys))
        .route("/auth/api-keys/:id", delete(revoke_api_key))
        .route_layer(middleware::from_fn_with_state(
            state.guard(AuthOptions::session_only()),
            require_auth,
        ));

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .merge(api_keys)
        .with_state(state)
}

async fn login(State(state): State<AuthState>, req: Request) -> Result<Response> {
    let client_ip = client_ip(&req, state.trust_proxy_headers);
    let body = to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| AuthError::invalid_input("invalid request body"))?;
    let payload: LoginRequest = parse_json(&body)?;

    let outcome = state
        .service
        .login(&payload.email, &payload.password, client_ip.as_deref())
        .await?;

    let session = outcome.session;
    let now = state.service.sessions().now();
    let cookie = state
        .cookie
        .write(&session.id, session.expires_at, now)
        .ok_or_else(|| AuthError::internal("failed to set session cookie"))?;

    let body = LoginResponse {
        session_expires_at: session.expires_at,
        csrf_token: session.csrf_token,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn logout(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = state.cookie.read(&headers) {
        if let Err(e) = state.service.logout(&session_id).await {
            warn!(error = %e, "Logout failed, clearing cookie anyway");
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Some(cookie) = state.cookie.clear() {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

async fn create_api_key(
    State(state): State<AuthState>,
    principal: Principal,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>)> {
    let payload: CreateApiKeyRequest = parse_json(&body)?;
    let created = state
        .service
        .api_keys()
        .create(&principal, &payload.name, &payload.scope)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            id: created.key.id,
            name: created.key.name,
            scope: created.key.scope,
            token: created.token,
            token_prefix: created.key.token_prefix,
            created_at: created.key.created_at,
        }),
    ))
}

async fn list_api_keys(
    State(state): State<AuthState>,
    principal: Principal,
) -> Result<Json<Vec<ApiKeyResponse>>> {
    let keys = state.service.api_keys().list(&principal).await?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

async fn revoke_api_key(
    State(state): State<AuthState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.service.api_keys().revoke(&principal, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|_| AuthError::invalid_input("invalid json"))
}

/// 客户端 IP：信任代理时优先取转发头，否则取连接对端地址
fn client_ip(req: &Request, trust_proxy_headers: bool) -> Option<String> {
    if trust_proxy_headers {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }

        let real_ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return Some(ip.to_string());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
