use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ApiKey;

/// API key 存储 trait
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// 插入新 key，ID 或令牌哈希重复时返回错误
    async fn insert(&self, key: ApiKey) -> Result<()>;

    /// 列出用户的全部 key（含已吊销），按创建时间倒序
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ApiKey>>;

    async fn get(&self, key_id: &str) -> Result<Option<ApiKey>>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<ApiKey>>;

    /// 标记吊销。已吊销的 key 保留原吊销时间；key 不存在时返回 false
    async fn revoke(&self, key_id: &str, at: DateTime<Utc>) -> Result<bool>;
}

#[derive(Default)]
struct Inner {
    keys: HashMap<String, ApiKey>,
    by_hash: HashMap<String, String>,
}

/// 内存 API key 存储（用于开发和测试）
#[derive(Default)]
pub struct MemoryApiKeyStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn insert(&self, key: ApiKey) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.keys.contains_key(&key.id) {
            bail!("api key {} already exists", key.id);
        }
        if inner.by_hash.contains_key(&key.token_hash) {
            bail!("api key token hash collision");
        }
        inner.by_hash.insert(key.token_hash.clone(), key.id.clone());
        inner.keys.insert(key.id.clone(), key);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        let inner = self.inner.read().await;
        let mut keys: Vec<ApiKey> = inner
            .keys
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn get(&self, key_id: &str) -> Result<Option<ApiKey>> {
        let inner = self.inner.read().await;
        Ok(inner.keys.get(key_id).cloned())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<ApiKey>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_hash
            .get(token_hash)
            .and_then(|id| inner.keys.get(id))
            .cloned())
    }

    async fn revoke(&self, key_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.keys.get_mut(key_id) {
            Some(key) => {
                if key.revoked_at.is_none() {
                    key.revoked_at = Some(at);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey::Scope;
    use chrono::Duration;

    fn key(id: &str, user_id: &str, created_at: DateTime<Utc>) -> ApiKey {
        ApiKey {
            id: id.to_string(),
            user_id: user_id.to_string(),
            user_role: "user".to_string(),
            name: id.to_string(),
            scope: Scope::ReadWrite,
            token_hash: format!("hash-{}", id),
            token_prefix: "sk_0123456789".to_string(),
            created_at,
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryApiKeyStore::new();
        let now = Utc::now();
        store.insert(key("key_a", "usr_1", now)).await.unwrap();

        assert!(store.get("key_a").await.unwrap().is_some());
        let found = store.find_by_token_hash("hash-key_a").await.unwrap().unwrap();
        assert_eq!(found.id, "key_a");
        assert!(store.find_by_token_hash("hash-missing").await.unwrap().is_none());

        assert!(store.insert(key("key_a", "usr_1", now)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryApiKeyStore::new();
        let now = Utc::now();
        store.insert(key("key_old", "usr_1", now)).await.unwrap();
        store
            .insert(key("key_new", "usr_1", now + Duration::minutes(1)))
            .await
            .unwrap();
        store.insert(key("key_other", "usr_2", now)).await.unwrap();

        let ids: Vec<String> = store
            .list_by_user("usr_1")
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.id)
            .collect();
        assert_eq!(ids, vec!["key_new", "key_old"]);
    }

    #[tokio::test]
    async fn test_revoke_keeps_first_timestamp() {
        let store = MemoryApiKeyStore::new();
        let now = Utc::now();
        store.insert(key("key_a", "usr_1", now)).await.unwrap();

        assert!(store.revoke("key_a", now).await.unwrap());
        assert!(store
            .revoke("key_a", now + Duration::hours(1))
            .await
            .unwrap());
        assert!(!store.revoke("key_missing", now).await.unwrap());

        let revoked = store.get("key_a").await.unwrap().unwrap();
        assert_eq!(revoked.revoked_at, Some(now));
    }
}
