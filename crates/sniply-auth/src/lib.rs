//! sniply 请求认证
//!
//! 会话 + CSRF、API key 与登录限流，通过一个 axum 中间件统一分派。

pub mod apikey;
pub mod auth;
pub mod clock;
pub mod csrf;
pub mod error;
pub mod ratelimit;
#[cfg(feature = "redis-store")]
pub mod redis_conn;
pub mod routes;
pub mod session;
pub mod state;
pub mod token;

pub use apikey::{ApiKey, ApiKeyService, ApiKeyStore, CreatedApiKey, MemoryApiKeyStore, Scope};
pub use auth::{
    require_auth, AuthGuard, AuthMethod, AuthOptions, AuthService, BcryptVerifier, Credential,
    MemoryUserStore, PasswordVerifier, Principal, UserRecord, UserStore,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, ErrorKind, Result};
pub use ratelimit::{Decision, FixedWindow, MemoryRateLimiter, RateLimiter};
pub use routes::router;
pub use session::{
    CookieConfig, MemorySessionStore, Session, SessionError, SessionManager, SessionPolicy,
    SessionStore,
};
pub use state::AuthState;
pub use token::{RandomTokenGenerator, Sha256TokenHasher, TokenGenerator, TokenHasher};

#[cfg(feature = "redis-store")]
pub use ratelimit::RedisRateLimiter;
#[cfg(feature = "redis-store")]
pub use session::RedisSessionStore;
