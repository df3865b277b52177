//! 随机令牌生成与 API key 哈希

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 随机令牌生成器
pub trait TokenGenerator: Send + Sync {
    /// 生成 `bytes` 字节随机数的十六进制串
    fn generate(&self, bytes: usize) -> String;
}

/// 基于操作系统随机源的生成器
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self, bytes: usize) -> String {
        let mut buf = vec![0u8; bytes];
        OsRng.fill_bytes(&mut buf);
        hex::encode(buf)
    }
}

/// 单向令牌哈希
pub trait TokenHasher: Send + Sync {
    fn hash(&self, token: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256TokenHasher;

impl TokenHasher for Sha256TokenHasher {
    fn hash(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.trim().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// 常量时间比较
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_tokens_are_unique_hex() {
        let generator = RandomTokenGenerator;
        let a = generator.generate(32);
        let b = generator.generate(32);

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sha256_hash_is_stable() {
        let hasher = Sha256TokenHasher;
        assert_eq!(hasher.hash("sk_abc"), hasher.hash("sk_abc"));
        assert_eq!(hasher.hash(" sk_abc "), hasher.hash("sk_abc"));
        assert_ne!(hasher.hash("sk_abc"), hasher.hash("sk_abd"));
        assert_eq!(hasher.hash("sk_abc").len(), 64);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("token", "token"));
        assert!(!constant_time_eq("token", "tokem"));
        assert!(!constant_time_eq("token", "tok"));
    }
}
