use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

use crate::{AuthSettings, SameSiteSetting};

const CONFIG_FILE: &str = "auth.toml";
const ENV_PREFIX: &str = "SNIPLY";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// 加载认证配置：auth.toml（可选）+ SNIPLY__* 环境变量覆盖
    pub fn load(&self) -> Result<AuthSettings> {
        let config_path = self.config_dir.join(CONFIG_FILE);

        let config = Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: AuthSettings = config.try_deserialize()?;
        Self::validate(&settings)?;
        Ok(settings)
    }

    /// 验证配置
    pub fn validate(settings: &AuthSettings) -> Result<()> {
        let session = &settings.session;

        if session.ttl_secs == 0 {
            return Err(anyhow!("session.ttl_secs must be greater than 0"));
        }

        if session.max_age_secs > 0 && session.max_age_secs < session.ttl_secs {
            return Err(anyhow!(
                "session.max_age_secs ({}) cannot be smaller than session.ttl_secs ({})",
                session.max_age_secs,
                session.ttl_secs
            ));
        }

        if session.refresh_before_secs >= session.ttl_secs {
            return Err(anyhow!(
                "session.refresh_before_secs ({}) must be smaller than session.ttl_secs ({})",
                session.refresh_before_secs,
                session.ttl_secs
            ));
        }

        // 至少 256 位随机数
        if session.id_bytes < 32 || session.csrf_bytes < 32 {
            return Err(anyhow!("session id and csrf token need at least 32 random bytes"));
        }

        if settings.cookie.name.trim().is_empty() {
            return Err(anyhow!("cookie.name must not be empty"));
        }

        if settings.cookie.same_site == SameSiteSetting::None && !settings.cookie.secure {
            return Err(anyhow!("cookie.same_site = \"none\" requires cookie.secure = true"));
        }

        let limit = &settings.login_rate_limit;
        if limit.enabled && (limit.limit == 0 || limit.window_secs == 0) {
            return Err(anyhow!(
                "login_rate_limit.limit and login_rate_limit.window_secs must be greater than 0"
            ));
        }

        if let Some(redis) = &settings.redis {
            if redis.url.trim().is_empty() {
                return Err(anyhow!("redis.url must not be empty"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_defaults_without_file() {
        let temp_dir = tempdir().unwrap();
        let loader = ConfigLoader::new(temp_dir.path());

        let settings = loader.load().unwrap();
        assert_eq!(settings.session.refresh_before_secs, 24 * 3600);
        assert_eq!(settings.login_rate_limit.window_secs, 60);
        assert!(!settings.trust_proxy_headers);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
trust_proxy_headers = true

[session]
ttl_secs = 3600
max_age_secs = 28800
refresh_before_secs = 600

[cookie]
secure = false
same_site = "strict"

[login_rate_limit]
limit = 10

[redis]
url = "redis://127.0.0.1:6379"
"#;

        fs::write(temp_dir.path().join("auth.toml"), config_content).unwrap();

        let loader = ConfigLoader::new(temp_dir.path());
        let settings = loader.load().unwrap();

        assert_eq!(settings.session.ttl_secs, 3600);
        assert_eq!(settings.session.max_age_secs, 28800);
        assert_eq!(settings.session.key_prefix, "sniply:session:");
        assert!(!settings.cookie.secure);
        assert_eq!(settings.cookie.same_site, SameSiteSetting::Strict);
        assert_eq!(settings.login_rate_limit.limit, 10);
        assert_eq!(settings.login_rate_limit.window_secs, 60);
        assert_eq!(settings.redis.unwrap().timeout_ms, 3000);
        assert!(settings.trust_proxy_headers);
    }

    #[test]
    fn test_default_settings_round_trip_through_file() {
        let temp_dir = tempdir().unwrap();
        let rendered = toml::to_string(&AuthSettings::default()).unwrap();
        fs::write(temp_dir.path().join("auth.toml"), rendered).unwrap();

        let settings = ConfigLoader::new(temp_dir.path()).load().unwrap();
        assert_eq!(settings.cookie.path, "/");
        assert_eq!(settings.session.max_age_secs, 30 * 24 * 3600);
    }

    #[test]
    fn test_validate_rejects_refresh_window_longer_than_ttl() {
        let mut settings = AuthSettings::default();
        settings.session.refresh_before_secs = settings.session.ttl_secs;

        assert!(ConfigLoader::validate(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_insecure_same_site_none() {
        let mut settings = AuthSettings::default();
        settings.cookie.same_site = SameSiteSetting::None;
        settings.cookie.secure = false;

        assert!(ConfigLoader::validate(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_short_session_ids() {
        let mut settings = AuthSettings::default();
        settings.session.id_bytes = 16;

        assert!(ConfigLoader::validate(&settings).is_err());
    }
}
