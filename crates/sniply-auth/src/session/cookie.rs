use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use sniply_config::{CookieSettings, SameSiteSetting};

const DEFAULT_COOKIE_NAME: &str = "sniply_session";

/// 会话 Cookie 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: SameSiteSetting,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::from(&CookieSettings::default())
    }
}

impl From<&CookieSettings> for CookieConfig {
    fn from(settings: &CookieSettings) -> Self {
        Self {
            name: settings.name.clone(),
            path: settings.path.clone(),
            domain: settings.domain.clone().filter(|d| !d.trim().is_empty()),
            secure: settings.secure,
            same_site: settings.same_site,
        }
    }
}

impl CookieConfig {
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_COOKIE_NAME
        } else {
            &self.name
        }
    }

    fn path(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }

    /// 从请求头读取会话 ID，空值视为不存在
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        let name = self.name();
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// 生成写入会话的 Set-Cookie 头
    pub fn write(
        &self,
        value: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<HeaderValue> {
        let max_age = expires_at.signed_duration_since(now).num_seconds().max(0);
        self.render(value, expires_at, max_age)
    }

    /// 生成清除会话的 Set-Cookie 头
    pub fn clear(&self) -> Option<HeaderValue> {
        self.render("", DateTime::<Utc>::default(), 0)
    }

    fn render(&self, value: &str, expires_at: DateTime<Utc>, max_age: i64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path={}; Expires={}; Max-Age={}; HttpOnly",
            self.name(),
            value,
            self.path(),
            expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
            max_age
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(match self.same_site {
            SameSiteSetting::Strict => "; SameSite=Strict",
            SameSiteSetting::Lax => "; SameSite=Lax",
            SameSiteSetting::None => "; SameSite=None",
        });

        HeaderValue::from_str(&cookie).ok()
    }
}
