use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Session;
use crate::clock::{Clock, SystemClock};

/// 会话存储 trait
///
/// 只负责带 TTL 的键值持久化，不包含任何业务规则。
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 保存会话，`ttl` 之后由存储自行淘汰
    async fn save(&self, session: &Session, ttl: Duration) -> Result<()>;

    /// 加载会话
    async fn load(&self, session_id: &str) -> Result<Option<Session>>;

    /// 删除会话，不存在时不报错
    async fn delete(&self, session_id: &str) -> Result<()>;
}

struct StoredSession {
    session: Session,
    evict_at: DateTime<Utc>,
}

/// 内存会话存储（用于开发和测试）
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// 当前条目数（包括尚未清理的过期条目）
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// 清理过期会话
    pub async fn purge_expired(&self) -> u64 {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before_count = sessions.len();

        sessions.retain(|_, stored| stored.evict_at > now);

        (before_count - sessions.len()) as u64
    }

    /// 启动定期清理任务
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                let removed = store.purge_expired().await;
                if removed > 0 {
                    info!(removed = removed, "Purged expired sessions");
                }
            }
        })
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)?;
        let evict_at = self.clock.now() + ttl;

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session.id.clone(),
            StoredSession {
                session: session.clone(),
                evict_at,
            },
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        let now = self.clock.now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(stored) if stored.evict_at > now => {
                    return Ok(Some(stored.session.clone()));
                }
                Some(_) => {}
            }
        }

        // TTL 已到，顺手删除
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|stored| stored.evict_at <= now)
        {
            sessions.remove(session_id);
            debug!("Evicted expired session on load");
        }
        Ok(None)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}

/// Redis 会话存储
#[cfg(feature = "redis-store")]
pub struct RedisSessionStore {
    conn: redis::aio::MultiplexedConnection,
    prefix: String,
    timeout: Duration,
}

#[cfg(feature = "redis-store")]
impl RedisSessionStore {
    pub fn new(
        conn: redis::aio::MultiplexedConnection,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.trim().is_empty() {
            "sniply:session:".to_string()
        } else {
            prefix.trim().to_string()
        };
        Self {
            conn,
            prefix,
            timeout,
        }
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.prefix, session_id)
    }
}

#[cfg(feature = "redis-store")]
#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &Session, ttl: Duration) -> Result<()> {
        use redis::AsyncCommands;

        let mut conn = self.conn.clone();
        let json = serde_json::to_string(session)?;
        let mut seconds = ttl.as_secs();
        if ttl.subsec_nanos() > 0 {
            seconds += 1;
        }
        let key = self.key(&session.id);

        crate::redis_conn::with_timeout(self.timeout, async move {
            conn.set_ex::<_, _, ()>(key, json, seconds.max(1)).await
        })
        .await
    }

    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        use redis::AsyncCommands;

        let mut conn = self.conn.clone();
        let key = self.key(session_id);
        let result = crate::redis_conn::with_timeout(self.timeout, async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await?;

        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        use redis::AsyncCommands;

        let mut conn = self.conn.clone();
        let key = self.key(session_id);
        crate::redis_conn::with_timeout(self.timeout, async move {
            conn.del::<_, ()>(key).await
        })
        .await
    }
}
