use axum::http::Method;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{BcryptVerifier, PasswordVerifier, Principal, UserStore};
use crate::apikey::ApiKeyService;
use crate::csrf;
use crate::error::{AuthError, Result};
use crate::ratelimit::RateLimiter;
use crate::session::{Session, SessionError, SessionManager};

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// 登录结果
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub session: Session,
}

/// 会话认证结果
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub principal: Principal,
    pub session: Session,
    /// 会话已续期，调用方需要重写 Cookie
    pub refreshed: bool,
}

/// 认证服务
///
/// 组合用户查询、限流、会话与 API key，所有错误在此归一化为 [`AuthError`]。
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<SessionManager>,
    api_keys: Arc<ApiKeyService>,
    limiter: Option<Arc<dyn RateLimiter>>,
    verifier: Arc<dyn PasswordVerifier>,
}

impl AuthService {
    /// 创建认证服务
    ///
    /// `limiter` 为 `None` 时登录不限流。
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<SessionManager>,
        api_keys: Arc<ApiKeyService>,
        limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        if limiter.is_none() {
            warn!("No login rate limiter configured, login attempts are not throttled");
        }
        Self {
            users,
            sessions,
            api_keys,
            limiter,
            verifier: Arc::new(BcryptVerifier),
        }
    }

    pub fn with_password_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn api_keys(&self) -> &Arc<ApiKeyService> {
        &self.api_keys
    }

    /// 邮箱密码登录
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client_ip: Option<&str>,
    ) -> Result<LoginOutcome> {
        let email = email.trim().to_lowercase();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::invalid_input("email and password are required"));
        }
        if !email.contains('@') {
            return Err(AuthError::invalid_input("invalid email"));
        }

        if let Some(ip) = client_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
            self.check_rate_limit(&format!("login:ip:{}", ip)).await?;
        }
        self.check_rate_limit(&format!("login:email:{}", email)).await?;

        let user = self.users.find_by_email(&email).await.map_err(|e| {
            error!(error = %e, "Failed to look up user");
            AuthError::internal("failed to authenticate")
        })?;
        let user = match user {
            Some(user) => user,
            None => {
                debug!("Login failed: unknown email");
                return Err(AuthError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !self.verify_password(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "Login failed: password mismatch");
            return Err(AuthError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let session = self
            .sessions
            .create(&user.id, &user.role)
            .await
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "Failed to create session");
                AuthError::internal("failed to create session")
            })?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginOutcome {
            principal: Principal::new(user.id, user.role),
            session,
        })
    }

    /// 注销会话，空 ID 不做任何操作
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Ok(());
        }

        self.sessions.delete(session_id).await.map_err(|e| {
            error!(error = %e, "Failed to delete session");
            AuthError::internal("failed to logout")
        })
    }

    /// API key 认证
    pub async fn authenticate_api_key(&self, token: &str, method: &Method) -> Result<Principal> {
        self.api_keys.authenticate(token, method).await
    }

    /// 会话认证：读取会话、校验 CSRF、滑动续期
    pub async fn authenticate_session(
        &self,
        session_id: &str,
        method: &Method,
        csrf_token: Option<&str>,
    ) -> Result<SessionAuth> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .map_err(session_error)?;

        if !csrf::verify(method, csrf_token, &session.csrf_token) {
            debug!(user_id = %session.user_id, method = %method, "CSRF token mismatch");
            return Err(AuthError::forbidden());
        }

        let (session, refreshed) = self
            .sessions
            .refresh(session)
            .await
            .map_err(session_error)?;

        Ok(SessionAuth {
            principal: Principal::new(session.user_id.clone(), session.role.clone()),
            session,
            refreshed,
        })
    }

    async fn check_rate_limit(&self, key: &str) -> Result<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        let decision = limiter.allow(key).await.map_err(|e| {
            error!(key, error = %e, "Rate limiter failure");
            AuthError::internal("failed to check rate limit")
        })?;
        if !decision.allowed {
            warn!(key, retry_after = ?decision.retry_after, "Login rate limited");
            return Err(AuthError::rate_limited(decision.retry_after));
        }
        Ok(())
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let verifier = self.verifier.clone();
        let password = password.to_string();
        let password_hash = password_hash.to_string();

        let matched = tokio::task::spawn_blocking(move || verifier.verify(&password, &password_hash))
            .await
            .map_err(|e| {
                error!(error = %e, "Password verification task failed");
                AuthError::internal("failed to authenticate")
            })?;

        matched.map_err(|e| {
            error!(error = %e, "Password verification failed");
            AuthError::internal("failed to authenticate")
        })
    }
}

fn session_error(err: SessionError) -> AuthError {
    match err {
        SessionError::NotFound => AuthError::unauthorized(),
        SessionError::Store(e) => {
            error!(error = %e, "Session store failure");
            AuthError::internal("failed to authenticate session")
        }
    }
}
