use axum::http::Method;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{ApiKey, ApiKeyStore, Scope};
use crate::auth::Principal;
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, Result};
use crate::token::{RandomTokenGenerator, Sha256TokenHasher, TokenGenerator, TokenHasher};

const TOKEN_PREFIX: &str = "sk_";
const TOKEN_BYTES: usize = 32;
const DISPLAY_PREFIX_LEN: usize = 12;
const ID_BYTES: usize = 12;

/// 新建 API key 的结果，原始令牌只在此处出现一次
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub key: ApiKey,
    pub token: String,
}

/// API key 管理服务
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    hasher: Arc<dyn TokenHasher>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(RandomTokenGenerator),
            hasher: Arc::new(Sha256TokenHasher),
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

    pub fn with_token_hasher(mut self, hasher: Arc<dyn TokenHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// 为当前用户创建 API key
    ///
    /// `scope` 为空时默认 `read_write`。
    pub async fn create(&self, owner: &Principal, name: &str, scope: &str) -> Result<CreatedApiKey> {
        let scope: Scope = scope.parse()?;

        let token = format!("{}{}", TOKEN_PREFIX, self.tokens.generate(TOKEN_BYTES));
        let key = ApiKey {
            id: format!("key_{}", self.tokens.generate(ID_BYTES)),
            user_id: owner.user_id.clone(),
            user_role: owner.role.clone(),
            name: name.trim().to_string(),
            scope,
            token_hash: self.hasher.hash(&token),
            token_prefix: token.chars().take(DISPLAY_PREFIX_LEN).collect(),
            created_at: self.clock.now(),
            revoked_at: None,
        };

        if let Err(e) = self.store.insert(key.clone()).await {
            error!(user_id = %owner.user_id, error = %e, "Failed to create api key");
            return Err(AuthError::internal("failed to create api key"));
        }

        info!(user_id = %owner.user_id, key_id = %key.id, scope = %key.scope, "API key created");
        Ok(CreatedApiKey { key, token })
    }

    /// 列出当前用户的 API key，最新的在前
    pub async fn list(&self, owner: &Principal) -> Result<Vec<ApiKey>> {
        self.store.list_by_user(&owner.user_id).await.map_err(|e| {
            error!(user_id = %owner.user_id, error = %e, "Failed to list api keys");
            AuthError::internal("failed to list api keys")
        })
    }

    /// 吊销 API key
    ///
    /// 不属于当前用户的 key 与不存在的 key 同样返回 NotFound；重复吊销视为成功。
    pub async fn revoke(&self, owner: &Principal, key_id: &str) -> Result<()> {
        let key_id = key_id.trim();
        if key_id.is_empty() {
            return Err(AuthError::invalid_input("invalid id"));
        }

        let key = self.store.get(key_id).await.map_err(|e| {
            error!(key_id, error = %e, "Failed to load api key");
            AuthError::internal("failed to load api key")
        })?;

        let key = match key {
            Some(key) if key.user_id == owner.user_id => key,
            _ => return Err(AuthError::not_found("api key not found")),
        };
        if key.is_revoked() {
            debug!(key_id, "API key already revoked");
            return Ok(());
        }

        let found = self
            .store
            .revoke(key_id, self.clock.now())
            .await
            .map_err(|e| {
                error!(key_id, error = %e, "Failed to revoke api key");
                AuthError::internal("failed to revoke api key")
            })?;
        if !found {
            return Err(AuthError::not_found("api key not found"));
        }

        info!(user_id = %owner.user_id, key_id, "API key revoked");
        Ok(())
    }

    /// 用原始令牌认证请求
    pub async fn authenticate(&self, token: &str, method: &Method) -> Result<Principal> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::unauthorized());
        }

        let hash = self.hasher.hash(token);
        let key = self.store.find_by_token_hash(&hash).await.map_err(|e| {
            error!(error = %e, "Failed to look up api key");
            AuthError::internal("failed to authenticate api key")
        })?;

        let key = match key {
            Some(key) if !key.is_revoked() => key,
            _ => return Err(AuthError::unauthorized()),
        };

        if !key.scope.allows_method(method) {
            debug!(key_id = %key.id, scope = %key.scope, method = %method, "API key scope denied");
            return Err(AuthError::forbidden());
        }

        Ok(Principal::new(key.user_id, key.user_role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey::MemoryApiKeyStore;
    use crate::error::ErrorKind;

    fn service() -> ApiKeyService {
        ApiKeyService::new(Arc::new(MemoryApiKeyStore::new()))
    }

    fn alice() -> Principal {
        Principal::new("usr_alice", "user")
    }

    #[tokio::test]
    async fn test_create_token_format() {
        let service = service();
        let created = service.create(&alice(), " ci ", "").await.unwrap();

        assert!(created.token.starts_with("sk_"));
        assert_eq!(created.token.len(), 3 + 64);
        assert_eq!(created.key.token_prefix, &created.token[..12]);
        assert_ne!(created.key.token_hash, created.token);
        assert!(created.key.id.starts_with("key_"));
        assert_eq!(created.key.id.len(), 4 + 24);
        assert_eq!(created.key.name, "ci");
        assert_eq!(created.key.scope, Scope::ReadWrite);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_scope() {
        let err = service().create(&alice(), "ci", "admin").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_authenticate_by_token() {
        let service = service();
        let created = service.create(&alice(), "ci", "read").await.unwrap();

        let principal = service
            .authenticate(&created.token, &Method::GET)
            .await
            .unwrap();
        assert_eq!(principal, alice());

        let err = service
            .authenticate(&created.token, &Method::POST)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = service.authenticate("sk_unknown", &Method::GET).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = service.authenticate("  ", &Method::GET).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_revoke() {
        let service = service();
        let created = service.create(&alice(), "ci", "read_write").await.unwrap();

        let bob = Principal::new("usr_bob", "user");
        let err = service.revoke(&bob, &created.key.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        service.revoke(&alice(), &created.key.id).await.unwrap();
        // 重复吊销
        service.revoke(&alice(), &created.key.id).await.unwrap();

        let err = service
            .authenticate(&created.token, &Method::GET)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let keys = service.list(&alice()).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_revoked());

        let err = service.revoke(&alice(), " ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = service.revoke(&alice(), "key_missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
