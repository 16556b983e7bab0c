use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveTime};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_reset_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    /// Public base URL used in invitation and reset links.
    pub site_url: String,

    // Attendance
    pub attendance_cutoff: NaiveTime,
    pub utc_offset: FixedOffset,

    pub password_reset_expiry_hours: i64,
    pub media_root: String,
    pub log_level: String,

    // Mail; `smtp` unset means messages are only logged
    pub smtp: Option<SmtpConfig>,
    pub default_from_email: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, raw, e))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let utc_offset_minutes: i32 = parsed("UTC_OFFSET_MINUTES", "60")?;
        let utc_offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .with_context(|| format!("UTC_OFFSET_MINUTES out of range: {}", utc_offset_minutes))?;

        let attendance_cutoff = NaiveTime::parse_from_str(
            &env::var("ATTENDANCE_CUTOFF").unwrap_or_else(|_| "08:10:00".to_string()),
            "%H:%M:%S",
        )
        .context("ATTENDANCE_CUTOFF must look like HH:MM:SS")?;

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: parsed("SMTP_PORT", "587")?,
                use_tls: parsed("SMTP_USE_TLS", "true")?,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: parsed("RATE_REGISTER_PER_MIN", "30")?,
            rate_refresh_per_min: parsed("RATE_REFRESH_PER_MIN", "30")?,
            rate_reset_per_min: parsed("RATE_RESET_PER_MIN", "10")?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),

            attendance_cutoff,
            utc_offset,

            password_reset_expiry_hours: parsed("PASSWORD_RESET_TOKEN_EXPIRY_HOURS", "1")?,
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),

            smtp,
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "StaffHub <no-reply@staffhub.local>".to_string()),
        })
    }

    /// Joins `path` onto the public site URL.
    pub fn site_link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.site_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://unused".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_refresh_per_min: 1000,
            rate_reset_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: "/api/v1".to_string(),
            site_url: "http://staffhub.test/".to_string(),
            attendance_cutoff: NaiveTime::from_hms_opt(8, 10, 0).unwrap(),
            utc_offset: FixedOffset::east_opt(3600).unwrap(),
            password_reset_expiry_hours: 1,
            media_root: std::env::temp_dir()
                .join("staffhub-test-media")
                .to_string_lossy()
                .into_owned(),
            log_level: "debug".to_string(),
            smtp: None,
            default_from_email: "StaffHub <no-reply@staffhub.test>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_link_joins_without_double_slash() {
        let config = Config::for_tests();
        assert_eq!(config.site_link("/register/abc"), "http://staffhub.test/register/abc");
        assert_eq!(config.site_link("register/abc"), "http://staffhub.test/register/abc");
    }
}
