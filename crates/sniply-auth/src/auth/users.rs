use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 登录所需的用户信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// 用户查询接口，由用户管理模块实现
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按规范化后的邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
}

/// 内存用户表（用于开发和测试）
#[derive(Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加用户，邮箱按小写存储
    pub async fn insert(&self, mut user: UserRecord) {
        user.email = user.email.trim().to_lowercase();
        self.users.write().await.insert(user.email.clone(), user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(email).cloned())
    }
}
