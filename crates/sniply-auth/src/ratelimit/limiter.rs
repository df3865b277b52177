use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{Decision, FixedWindow, RateLimiter};
use crate::clock::{Clock, SystemClock};

struct Counter {
    count: u64,
    resets_at: DateTime<Utc>,
}

struct Windows {
    counters: HashMap<String, Counter>,
    /// 下一次顺带清理的时间
    next_sweep: DateTime<Utc>,
}

impl Windows {
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.resets_at > now);
        before - self.counters.len()
    }
}

/// 进程内固定窗口限流器
///
/// 多实例部署时计数不共享，需要改用 Redis 实现。
/// 已结束的窗口在每个窗口周期内最多顺带清理一次，也可以用 [`Self::spawn_purge_task`] 定期清理。
pub struct MemoryRateLimiter {
    window: FixedWindow,
    windows: Arc<Mutex<Windows>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRateLimiter {
    pub fn new(window: FixedWindow) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: FixedWindow, clock: Arc<dyn Clock>) -> Self {
        let next_sweep = clock.now();
        Self {
            window: window.normalized(),
            windows: Arc::new(Mutex::new(Windows {
                counters: HashMap::new(),
                next_sweep,
            })),
            clock,
        }
    }

    /// 当前计数器数量（包括尚未清理的过期窗口）
    pub async fn len(&self) -> usize {
        self.windows.lock().await.counters.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.lock().await.counters.is_empty()
    }

    /// 清理已结束窗口的计数器
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.windows.lock().await.sweep(now)
    }

    /// 启动定期清理任务
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                let removed = limiter.purge_expired().await;
                if removed > 0 {
                    info!(removed = removed, "Purged expired rate limit windows");
                }
            }
        })
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn allow(&self, key: &str) -> Result<Decision> {
        let now = self.clock.now();
        let window = chrono::Duration::from_std(self.window.window)?;
        let key = self.window.key(key);

        let mut windows = self.windows.lock().await;
        if windows.next_sweep <= now {
            let removed = windows.sweep(now);
            if removed > 0 {
                debug!(removed, "Swept expired rate limit windows");
            }
            windows.next_sweep = now + window;
        }

        let counter = windows.counters.entry(key.clone()).or_insert(Counter {
            count: 0,
            resets_at: now + window,
        });
        if counter.resets_at <= now {
            counter.count = 0;
            counter.resets_at = now + window;
        }
        counter.count += 1;

        let retry_after = counter
            .resets_at
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let allowed = counter.count <= self.window.limit;
        if !allowed {
            debug!(key = %key, count = counter.count, "Rate limit exceeded");
        }

        Ok(Decision {
            allowed,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(clock: Arc<ManualClock>) -> MemoryRateLimiter {
        MemoryRateLimiter::with_clock(FixedWindow::new(5, Duration::from_secs(60)), clock)
    }

    #[tokio::test]
    async fn test_blocks_after_limit_until_window_ends() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());

        for _ in 0..5 {
            assert!(limiter.allow("login:email:a@b.c").await.unwrap().allowed);
        }

        clock.advance(chrono::Duration::seconds(20));
        let decision = limiter.allow("login:email:a@b.c").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Duration::from_secs(40));

        clock.advance(chrono::Duration::seconds(40));
        assert!(limiter.allow("login:email:a@b.c").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock);

        for _ in 0..6 {
            limiter.allow("login:ip:10.0.0.1").await.unwrap();
        }
        assert!(!limiter.allow("login:ip:10.0.0.1").await.unwrap().allowed);
        assert!(limiter.allow("login:ip:10.0.0.2").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());

        limiter.allow("a").await.unwrap();
        clock.advance(chrono::Duration::seconds(30));
        limiter.allow("b").await.unwrap();
        clock.advance(chrono::Duration::seconds(31));

        assert_eq!(limiter.purge_expired().await, 1);
        assert_eq!(limiter.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_windows_are_evicted_on_allow() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());

        for i in 0..1000 {
            let key = format!("login:ip:10.0.{}.{}", i / 256, i % 256);
            limiter.allow(&key).await.unwrap();
        }
        assert_eq!(limiter.len().await, 1000);

        clock.advance(chrono::Duration::hours(24));
        assert!(limiter.allow("login:ip:10.9.9.9").await.unwrap().allowed);
        assert_eq!(limiter.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_task_evicts_expired_windows() {
        let clock = Arc::new(ManualClock::default());
        let limiter = Arc::new(limiter(clock.clone()));

        limiter.allow("login:email:a@b.c").await.unwrap();
        clock.advance(chrono::Duration::seconds(61));

        let handle = limiter.spawn_purge_task(Duration::from_secs(1));
        // 第一次 tick 立即触发
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(limiter.is_empty().await);
        handle.abort();
    }
}
