pub mod credential;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod service;
pub mod users;

pub use credential::{api_key_token, AuthOptions, Authentication, Credential, API_KEY_HEADER};
pub use middleware::{require_auth, AuthGuard};
pub use password::{BcryptVerifier, PasswordVerifier};
pub use principal::{AuthMethod, Principal};
pub use service::{AuthService, LoginOutcome, SessionAuth};
pub use users::{MemoryUserStore, UserRecord, UserStore};
