use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub run_migrations: bool,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_scan_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Field operations
    pub max_photo_bytes: usize,
    /// JSON body limit; checklist submissions carry several photos.
    pub max_body_bytes: usize,
    /// A tracking row older than this is shown as inactive even without a clock-out.
    pub activity_window_mins: i64,
    /// Shifts open longer than this are reported as stale.
    pub stale_shift_hours: i64,
    pub roster_cache_ttl_secs: u64,

    /// IP lookup endpoint, `{ip}` is substituted. Disabled when unset.
    pub geo_lookup_url: Option<String>,
    pub geo_lookup_timeout_ms: u64,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(key, env::var(key).ok().as_deref(), default)
}

fn parse_or<T>(key: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: or_default("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: or_default("REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            run_migrations: or_default("RUN_MIGRATIONS", false)?,

            rate_login_per_min: or_default("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: or_default("RATE_REFRESH_PER_MIN", 30)?,
            rate_scan_per_min: or_default("RATE_SCAN_PER_MIN", 120)?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            max_photo_bytes: or_default("MAX_PHOTO_BYTES", 5 * 1024 * 1024)?,
            max_body_bytes: or_default("MAX_BODY_BYTES", 48 * 1024 * 1024)?,
            activity_window_mins: or_default("ACTIVITY_WINDOW_MINS", 240)?,
            stale_shift_hours: or_default("STALE_SHIFT_HOURS", 14)?,
            roster_cache_ttl_secs: or_default("ROSTER_CACHE_TTL_SECS", 60)?,

            geo_lookup_url: env::var("GEO_LOOKUP_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            geo_lookup_timeout_ms: or_default("GEO_LOOKUP_TIMEOUT_MS", 1500)?,
        })
    }

    /// Config used by handler tests; never touches the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/cleanops_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            run_migrations: false,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_scan_per_min: 120,
            rate_protected_per_min: 1000,
            api_prefix: "/api/v1".to_string(),
            max_photo_bytes: 1024,
            max_body_bytes: 64 * 1024,
            activity_window_mins: 240,
            stale_shift_hours: 14,
            roster_cache_ttl_secs: 60,
            geo_lookup_url: None,
            geo_lookup_timeout_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_fall_back_to_the_default() {
        let value: u32 = parse_or("RATE_SCAN_PER_MIN", None, 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let value: u64 = parse_or("MAX_BODY_BYTES", Some(" 1024 "), 1).unwrap();
        assert_eq!(value, 1024);
        let flag: bool = parse_or("RUN_MIGRATIONS", Some("true"), false).unwrap();
        assert!(flag);
    }

    #[test]
    fn garbage_values_are_rejected_with_the_key_name() {
        let parsed: Result<u32> = parse_or("RATE_SCAN_PER_MIN", Some("twelve"), 1);
        let err = parsed.unwrap_err().to_string();
        assert!(err.contains("RATE_SCAN_PER_MIN"));
    }

    #[test]
    fn test_config_keeps_limits_positive() {
        let config = Config::for_tests();
        assert!(config.max_body_bytes > config.max_photo_bytes);
        assert!(config.rate_scan_per_min > 0);
    }
}
