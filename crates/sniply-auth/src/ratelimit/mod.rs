//! 登录限流：固定窗口计数器

pub mod limiter;
#[cfg(feature = "redis-store")]
pub mod distributed;

pub use limiter::MemoryRateLimiter;
#[cfg(feature = "redis-store")]
pub use distributed::RedisRateLimiter;

use anyhow::Result;
use async_trait::async_trait;
use sniply_config::RateLimitSettings;
use std::time::Duration;

const DEFAULT_LIMIT: u64 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_PREFIX: &str = "sniply:ratelimit:";

/// 单次限流判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// 当前窗口剩余时间
    pub retry_after: Duration,
}

/// 限流器 trait
///
/// 每次调用都计入一次尝试，无论最终是否放行。
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, key: &str) -> Result<Decision>;
}

/// 固定窗口参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow {
    pub limit: u64,
    pub window: Duration,
    pub prefix: String,
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl From<&RateLimitSettings> for FixedWindow {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            limit: settings.limit,
            window: Duration::from_secs(settings.window_secs),
            prefix: settings.key_prefix.clone(),
        }
        .normalized()
    }
}

impl FixedWindow {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            ..Self::default()
        }
        .normalized()
    }

    /// 非正值回落到默认值
    pub fn normalized(mut self) -> Self {
        if self.limit == 0 {
            self.limit = DEFAULT_LIMIT;
        }
        if self.window.is_zero() {
            self.window = DEFAULT_WINDOW;
        }
        if self.prefix.trim().is_empty() {
            self.prefix = DEFAULT_PREFIX.to_string();
        }
        self
    }

    pub(crate) fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}
