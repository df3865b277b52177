use serde::{Deserialize, Serialize};

/// 认证配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthSettings {
    /// 是否信任 X-Forwarded-For / X-Real-IP
    #[serde(default)]
    pub trust_proxy_headers: bool,

    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub cookie: CookieSettings,
    #[serde(default)]
    pub login_rate_limit: RateLimitSettings,

    /// 共享存储（未配置时使用进程内存储）
    #[serde(default)]
    pub redis: Option<RedisSettings>,
}

/// 会话配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// 滑动过期时间（秒）
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// 会话最长存活时间（秒），0 表示不限制
    #[serde(default = "default_session_max_age")]
    pub max_age_secs: u64,

    /// 剩余时间低于该值时才续期（秒）
    #[serde(default = "default_refresh_before")]
    pub refresh_before_secs: u64,

    #[serde(default = "default_id_bytes")]
    pub id_bytes: usize,

    #[serde(default = "default_csrf_bytes")]
    pub csrf_bytes: usize,

    #[serde(default = "default_session_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookieSettings {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_cookie_secure")]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSiteSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteSetting {
    Strict,
    #[default]
    Lax,
    None,
}

/// 登录限流配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rate_limit")]
    pub limit: u64,
    #[serde(default = "default_rate_window")]
    pub window_secs: u64,
    #[serde(default = "default_rate_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisSettings {
    pub url: String,

    /// 单次操作超时（毫秒）
    #[serde(default = "default_redis_timeout")]
    pub timeout_ms: u64,
}

// 默认值函数
fn default_session_ttl() -> u64 {
    7 * 24 * 3600
}

fn default_session_max_age() -> u64 {
    30 * 24 * 3600
}

fn default_refresh_before() -> u64 {
    24 * 3600
}

fn default_id_bytes() -> usize {
    32
}

fn default_csrf_bytes() -> usize {
    32
}

fn default_session_prefix() -> String {
    "sniply:session:".to_string()
}

fn default_cookie_name() -> String {
    "sniply_session".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_rate_limit() -> u64 {
    5
}

fn default_rate_window() -> u64 {
    60
}

fn default_rate_prefix() -> String {
    "sniply:ratelimit:".to_string()
}

fn default_redis_timeout() -> u64 {
    3000
}

// Default trait 实现
impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            max_age_secs: default_session_max_age(),
            refresh_before_secs: default_refresh_before(),
            id_bytes: default_id_bytes(),
            csrf_bytes: default_csrf_bytes(),
            key_prefix: default_session_prefix(),
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            path: default_cookie_path(),
            domain: None,
            secure: default_cookie_secure(),
            same_site: SameSiteSetting::default(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            limit: default_rate_limit(),
            window_secs: default_rate_window(),
            key_prefix: default_rate_prefix(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            trust_proxy_headers: false,
            session: SessionSettings::default(),
            cookie: CookieSettings::default(),
            login_rate_limit: RateLimitSettings::default(),
            redis: None,
        }
    }
}
