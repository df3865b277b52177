use anyhow::Result;
use tracing::warn;

/// 密码哈希校验
///
/// 实现是 CPU 密集的同步调用，由 [`crate::AuthService`] 放到阻塞线程池执行。
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, password: &str, password_hash: &str) -> Result<bool>;
}

/// bcrypt 校验器
#[derive(Debug, Default, Clone, Copy)]
pub struct BcryptVerifier;

impl PasswordVerifier for BcryptVerifier {
    fn verify(&self, password: &str, password_hash: &str) -> Result<bool> {
        match bcrypt::verify(password, password_hash) {
            Ok(matched) => Ok(matched),
            // 格式错误的哈希按不匹配处理
            Err(e) => {
                warn!(error = %e, "Malformed password hash");
                Ok(false)
            }
        }
    }
}
