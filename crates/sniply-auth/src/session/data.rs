use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 会话数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// 会话 ID（不透明随机串）
    pub id: String,

    /// 用户 ID
    pub user_id: String,

    /// 用户角色
    pub role: String,

    /// CSRF 令牌，会话生命周期内不变
    pub csrf_token: String,

    pub created_at: DateTime<Utc>,

    pub last_refreshed_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// 距离过期的剩余时间（已过期时为负）
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at.signed_duration_since(now)
    }

    /// 检查会话是否过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// 是否超过最长存活时间
    pub fn exceeds_max_age(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now > self.created_at + max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(now: DateTime<Utc>) -> Session {
        Session {
            id: "ses_test".to_string(),
            user_id: "usr_1".to_string(),
            role: "user".to_string(),
            csrf_token: "csrf".to_string(),
            created_at: now,
            last_refreshed_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn test_session_expiration() {
        let now = Utc::now();
        let session = session_at(now);

        assert!(!session.is_expired(now));
        assert!(!session.is_expired(now + Duration::hours(1)));
        assert!(session.is_expired(now + Duration::hours(1) + Duration::seconds(1)));
        assert_eq!(session.remaining(now), Duration::hours(1));
    }

    #[test]
    fn test_session_max_age() {
        let now = Utc::now();
        let session = session_at(now);

        assert!(!session.exceeds_max_age(now + Duration::hours(8), Duration::hours(8)));
        assert!(session.exceeds_max_age(
            now + Duration::hours(8) + Duration::seconds(1),
            Duration::hours(8)
        ));
    }

    #[test]
    fn test_session_json_shape() {
        let session = session_at(Utc::now());
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["user_id"], "usr_1");
        assert_eq!(json["csrf_token"], "csrf");
        assert!(json["expires_at"].is_string());

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
