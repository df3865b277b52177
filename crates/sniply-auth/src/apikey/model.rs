use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// API key 权限范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Read,
    Write,
    ReadWrite,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::ReadWrite => "read_write",
        }
    }

    /// 检查该范围是否允许此 HTTP 方法
    ///
    /// `read` 仅允许 GET/HEAD/OPTIONS，`write` 仅允许修改类方法，`read_write` 全部允许。
    pub fn allows_method(&self, method: &Method) -> bool {
        let safe = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
        match self {
            Scope::Read => safe,
            Scope::Write => !safe,
            Scope::ReadWrite => true,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            // 未指定时默认读写
            "" | "read_write" => Ok(Scope::ReadWrite),
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            _ => Err(AuthError::invalid_input("invalid scope")),
        }
    }
}

/// 持久化的 API key，不含原始令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    /// 创建时所有者的角色
    pub user_role: String,
    pub name: String,
    pub scope: Scope,
    pub token_hash: String,
    /// 令牌前缀，仅用于展示
    pub token_prefix: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_allows_method() {
        assert!(Scope::Read.allows_method(&Method::GET));
        assert!(Scope::Read.allows_method(&Method::HEAD));
        assert!(!Scope::Read.allows_method(&Method::POST));
        assert!(!Scope::Read.allows_method(&Method::DELETE));

        assert!(Scope::Write.allows_method(&Method::PUT));
        assert!(!Scope::Write.allows_method(&Method::GET));

        for method in [Method::GET, Method::POST, Method::PATCH, Method::DELETE] {
            assert!(Scope::ReadWrite.allows_method(&method));
        }
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!("read".parse::<Scope>().unwrap(), Scope::Read);
        assert_eq!(" write ".parse::<Scope>().unwrap(), Scope::Write);
        assert_eq!("".parse::<Scope>().unwrap(), Scope::ReadWrite);
        assert!("admin".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_serde_names() {
        assert_eq!(
            serde_json::to_string(&Scope::ReadWrite).unwrap(),
            "\"read_write\""
        );
        assert_eq!(Scope::Read.to_string(), "read");
    }
}
