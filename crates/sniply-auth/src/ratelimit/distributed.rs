use anyhow::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::time::Duration;
use tracing::debug;

use super::{Decision, FixedWindow, RateLimiter};
use crate::redis_conn::with_timeout;

/// 首次计数时设置过期，计数与剩余 TTL 原子返回
const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Redis 固定窗口限流器，多实例共享计数
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    window: FixedWindow,
    script: Script,
    timeout: Duration,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, window: FixedWindow, timeout: Duration) -> Self {
        Self {
            conn,
            window: window.normalized(),
            script: Script::new(FIXED_WINDOW_SCRIPT),
            timeout,
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &str) -> Result<Decision> {
        let mut conn = self.conn.clone();
        let key = self.window.key(key);
        let window_ms = self.window.window.as_millis() as u64;

        let mut invocation = self.script.key(&key);
        invocation.arg(window_ms);
        let (count, ttl_ms): (u64, i64) =
            with_timeout(self.timeout, invocation.invoke_async(&mut conn)).await?;

        let allowed = count <= self.window.limit;
        if !allowed {
            debug!(key = %key, count, "Rate limit exceeded");
        }

        Ok(Decision {
            allowed,
            retry_after: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }
}
