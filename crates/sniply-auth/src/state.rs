use anyhow::Result;
use sniply_config::{AuthSettings, ConfigLoader};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::apikey::{ApiKeyService, ApiKeyStore, MemoryApiKeyStore};
use crate::auth::{AuthGuard, AuthOptions, AuthService, UserStore};
use crate::ratelimit::{FixedWindow, MemoryRateLimiter, RateLimiter};
use crate::session::{CookieConfig, MemorySessionStore, SessionManager, SessionPolicy, SessionStore};

const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

type Backends = (Arc<dyn SessionStore>, Option<Arc<dyn RateLimiter>>);

/// 认证路由共享状态
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
    pub cookie: CookieConfig,
    /// 是否信任 X-Forwarded-For / X-Real-IP
    pub trust_proxy_headers: bool,
}

impl AuthState {
    pub fn new(service: Arc<AuthService>, cookie: CookieConfig) -> Self {
        Self {
            service,
            cookie,
            trust_proxy_headers: false,
        }
    }

    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// 生成给定认证方式的中间件状态
    pub fn guard(&self, options: AuthOptions) -> AuthGuard {
        AuthGuard {
            service: self.service.clone(),
            cookie: self.cookie.clone(),
            options,
        }
    }

    /// 按配置组装完整的认证服务
    ///
    /// 配置了 Redis 时会话与限流计数都放在 Redis，否则使用进程内存储；
    /// API key 使用内存存储，持久化实现可通过 [`AuthState::from_parts`] 注入。
    pub async fn from_settings(settings: &AuthSettings, users: Arc<dyn UserStore>) -> Result<Self> {
        Self::from_parts(settings, users, Arc::new(MemoryApiKeyStore::new())).await
    }

    pub async fn from_parts(
        settings: &AuthSettings,
        users: Arc<dyn UserStore>,
        api_key_store: Arc<dyn ApiKeyStore>,
    ) -> Result<Self> {
        ConfigLoader::validate(settings)?;

        let (session_store, limiter) = match &settings.redis {
            Some(_) => redis_backends(settings).await?,
            None => memory_backends(settings),
        };

        let sessions = Arc::new(SessionManager::new(
            session_store,
            SessionPolicy::from(&settings.session),
        ));
        let api_keys = Arc::new(ApiKeyService::new(api_key_store));
        let service = Arc::new(AuthService::new(users, sessions, api_keys, limiter));

        info!(
            redis = settings.redis.is_some(),
            rate_limit = settings.login_rate_limit.enabled,
            "Auth service initialized"
        );

        Ok(Self::new(service, CookieConfig::from(&settings.cookie))
            .with_trust_proxy_headers(settings.trust_proxy_headers))
    }
}

fn memory_backends(settings: &AuthSettings) -> Backends {
    let store = Arc::new(MemorySessionStore::new());
    store.spawn_purge_task(MEMORY_PURGE_INTERVAL);

    let limiter = settings.login_rate_limit.enabled.then(|| {
        let limiter = Arc::new(MemoryRateLimiter::new(FixedWindow::from(
            &settings.login_rate_limit,
        )));
        limiter.spawn_purge_task(MEMORY_PURGE_INTERVAL);
        limiter as Arc<dyn RateLimiter>
    });
    (store as Arc<dyn SessionStore>, limiter)
}

#[cfg(feature = "redis-store")]
async fn redis_backends(settings: &AuthSettings) -> Result<Backends> {
    use crate::ratelimit::RedisRateLimiter;
    use crate::session::RedisSessionStore;

    let Some(redis) = &settings.redis else {
        return Ok(memory_backends(settings));
    };
    let conn = crate::redis_conn::connect(&redis.url).await?;
    let timeout = Duration::from_millis(redis.timeout_ms);

    let store = Arc::new(RedisSessionStore::new(
        conn.clone(),
        settings.session.key_prefix.clone(),
        timeout,
    ));
    let limiter = settings.login_rate_limit.enabled.then(|| {
        Arc::new(RedisRateLimiter::new(
            conn,
            FixedWindow::from(&settings.login_rate_limit),
            timeout,
        )) as Arc<dyn RateLimiter>
    });
    Ok((store as Arc<dyn SessionStore>, limiter))
}

#[cfg(not(feature = "redis-store"))]
async fn redis_backends(_settings: &AuthSettings) -> Result<Backends> {
    anyhow::bail!("redis is configured but the redis-store feature is not enabled")
}
