//! API key 管理与认证

pub mod model;
pub mod service;
pub mod store;

pub use model::{ApiKey, Scope};
pub use service::{ApiKeyService, CreatedApiKey};
pub use store::{ApiKeyStore, MemoryApiKeyStore};
