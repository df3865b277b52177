use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use sniply_auth::{AuthState, MemoryUserStore, UserRecord};
use sniply_config::AuthSettings;
use std::sync::Arc;
use tower::ServiceExt;

async fn users() -> Arc<MemoryUserStore> {
    let users = Arc::new(MemoryUserStore::new());
    users
        .insert(UserRecord {
            id: "usr_carol".to_string(),
            email: "carol@example.com".to_string(),
            password_hash: bcrypt::hash("s3cret", 4).unwrap(),
            role: "admin".to_string(),
        })
        .await;
    users
}

#[tokio::test]
async fn test_from_default_settings() {
    let settings = AuthSettings::default();
    let state = AuthState::from_settings(&settings, users().await)
        .await
        .unwrap();
    assert!(!state.trust_proxy_headers);
    assert_eq!(state.cookie.name(), "sniply_session");

    let app = sniply_auth::router(state);
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .body(Body::from(
            json!({ "email": "carol@example.com", "password": "s3cret" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("; Secure"));
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let mut settings = AuthSettings::default();
    settings.session.ttl_secs = 0;

    assert!(AuthState::from_settings(&settings, users().await).await.is_err());
}

#[cfg(not(feature = "redis-store"))]
#[tokio::test]
async fn test_redis_requires_feature() {
    use sniply_config::RedisSettings;

    let settings = AuthSettings {
        redis: Some(RedisSettings {
            url: "redis://127.0.0.1:6379".to_string(),
            timeout_ms: 100,
        }),
        ..AuthSettings::default()
    };

    assert!(AuthState::from_settings(&settings, users().await).await.is_err());
}
