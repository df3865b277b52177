use chrono::{DateTime, Utc};
use sniply_config::SessionSettings;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Session, SessionStore};
use crate::clock::{Clock, SystemClock};
use crate::token::{RandomTokenGenerator, TokenGenerator};

const MIN_RANDOM_BYTES: usize = 32;

/// 会话错误
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// 会话过期策略
///
/// `max_age` 与 `refresh_before` 为零时表示禁用对应规则。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// 滑动过期时间
    pub ttl: Duration,
    /// 从创建时刻算起的硬上限
    pub max_age: Duration,
    /// 剩余时间不超过该值时才续期
    pub refresh_before: Duration,
    pub id_bytes: usize,
    pub csrf_bytes: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionPolicy {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_secs),
            max_age: Duration::from_secs(settings.max_age_secs),
            refresh_before: Duration::from_secs(settings.refresh_before_secs),
            id_bytes: settings.id_bytes,
            csrf_bytes: settings.csrf_bytes,
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}

/// 会话管理器
///
/// 在 [`SessionStore`] 之上实现创建、读取、滑动续期与删除。
/// 会话的 `expires_at` 永远不会超过 `created_at + max_age`。
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
}

impl SessionManager {
    /// 创建新的会话管理器
    pub fn new(store: Arc<dyn SessionStore>, policy: SessionPolicy) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(RandomTokenGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 创建新会话
    pub async fn create(&self, user_id: &str, role: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let id = format!(
            "ses_{}",
            self.tokens.generate(self.policy.id_bytes.max(MIN_RANDOM_BYTES))
        );
        let csrf_token = self
            .tokens
            .generate(self.policy.csrf_bytes.max(MIN_RANDOM_BYTES));

        let session = Session {
            id,
            user_id: user_id.to_string(),
            role: role.to_string(),
            csrf_token,
            created_at: now,
            last_refreshed_at: now,
            expires_at: self.capped_expiry(now, now),
        };

        self.persist(&session, now).await?;

        info!(user_id = %session.user_id, expires_at = %session.expires_at, "Session created");
        Ok(session)
    }

    /// 获取会话
    ///
    /// 超过 `max_age` 的会话即使存储 TTL 未到也会被删除并返回 `NotFound`。
    pub async fn get(&self, session_id: &str) -> Result<Session, SessionError> {
        if session_id.trim().is_empty() {
            return Err(SessionError::NotFound);
        }

        let session = self
            .store
            .load(session_id)
            .await?
            .ok_or(SessionError::NotFound)?;

        let now = self.clock.now();
        if self.past_max_age(&session, now) || session.is_expired(now) {
            self.discard(&session.id).await;
            return Err(SessionError::NotFound);
        }

        Ok(session)
    }

    /// 滑动续期
    ///
    /// 剩余时间不少于 `refresh_before` 时不写存储，返回 `(session, false)`。
    pub async fn refresh(&self, mut session: Session) -> Result<(Session, bool), SessionError> {
        let now = self.clock.now();
        if self.past_max_age(&session, now) {
            self.discard(&session.id).await;
            return Err(SessionError::NotFound);
        }

        if self.policy.ttl.is_zero() {
            return Ok((session, false));
        }

        // 剩余时间恰好等于 refresh_before 时不续期
        if !self.policy.refresh_before.is_zero()
            && session.remaining(now) >= to_chrono(self.policy.refresh_before)
        {
            return Ok((session, false));
        }

        let expires_at = self.capped_expiry(session.created_at, now);
        if expires_at <= session.expires_at {
            // 已到达 max_age 上限，无法再延长
            return Ok((session, false));
        }

        session.expires_at = expires_at;
        session.last_refreshed_at = now;
        self.persist(&session, now).await?;

        debug!(user_id = %session.user_id, expires_at = %session.expires_at, "Session refreshed");
        Ok((session, true))
    }

    /// 删除会话（幂等）
    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.delete(session_id).await?;
        debug!("Session deleted");
        Ok(())
    }

    fn past_max_age(&self, session: &Session, now: DateTime<Utc>) -> bool {
        !self.policy.max_age.is_zero()
            && session.exceeds_max_age(now, to_chrono(self.policy.max_age))
    }

    fn capped_expiry(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let sliding = now + to_chrono(self.policy.ttl);
        if self.policy.max_age.is_zero() {
            return sliding;
        }
        sliding.min(created_at + to_chrono(self.policy.max_age))
    }

    async fn persist(&self, session: &Session, now: DateTime<Utc>) -> Result<(), SessionError> {
        let ttl = session
            .remaining(now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(Duration::from_secs(1));
        self.store.save(session, ttl).await?;
        Ok(())
    }

    async fn discard(&self, session_id: &str) {
        if let Err(e) = self.store.delete(session_id).await {
            warn!(error = %e, "Failed to delete expired session");
        } else {
            debug!("Session expired and removed");
        }
    }
}
