pub mod cookie;
pub mod data;
pub mod manager;
pub mod store;

pub use cookie::CookieConfig;
pub use data::Session;
pub use manager::{SessionError, SessionManager, SessionPolicy};
pub use store::{MemorySessionStore, SessionStore};

#[cfg(feature = "redis-store")]
pub use store::RedisSessionStore;
