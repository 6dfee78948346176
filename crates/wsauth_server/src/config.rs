//! Server configuration from `WSAUTH_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use wsauth_core::provisioner::{DEFAULT_CERT_ALIAS, DEFAULT_VALIDITY_DAYS};
use wsauth_core::RetryPolicy;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4200";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_AUTHORITY_ENV: &str = "dev";

#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub authority_url: String,
    pub authority_token: Option<String>,
    pub authority_env: String,
    pub cert_alias: String,
    pub cert_validity_days: i64,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_max_connections", &self.db_max_connections)
            .field("authority_url", &self.authority_url)
            .field("authority_token", &self.authority_token.as_ref().map(|_| "<redacted>"))
            .field("authority_env", &self.authority_env)
            .field("cert_alias", &self.cert_alias)
            .field("cert_validity_days", &self.cert_validity_days)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };

        let authority_url = required("WSAUTH_AUTHORITY_URL")?;
        reqwest::Url::parse(&authority_url)
            .with_context(|| format!("WSAUTH_AUTHORITY_URL is not a valid URL: {authority_url}"))?;

        let max_attempts: u32 = parse_or(&lookup, "WSAUTH_RETRY_MAX_ATTEMPTS", 3)?;
        if max_attempts < 1 {
            bail!("WSAUTH_RETRY_MAX_ATTEMPTS must be at least 1");
        }
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts,
            delay: millis_or(&lookup, "WSAUTH_RETRY_DELAY_MS", defaults.delay)?,
            attempt_timeout: millis_or(&lookup, "WSAUTH_ATTEMPT_TIMEOUT_MS", defaults.attempt_timeout)?,
            overall_deadline: Some(millis_or(
                &lookup,
                "WSAUTH_DEADLINE_MS",
                defaults.overall_deadline.unwrap_or(Duration::from_secs(60)),
            )?),
        };

        Ok(Self {
            bind_addr: lookup("WSAUTH_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: required("WSAUTH_DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "WSAUTH_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            authority_url,
            authority_token: lookup("WSAUTH_AUTHORITY_TOKEN").filter(|v| !v.is_empty()),
            authority_env: lookup("WSAUTH_AUTHORITY_ENV")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_ENV.into()),
            cert_alias: lookup("WSAUTH_CERT_ALIAS").unwrap_or_else(|| DEFAULT_CERT_ALIAS.into()),
            cert_validity_days: parse_or(&lookup, "WSAUTH_CERT_VALIDITY_DAYS", DEFAULT_VALIDITY_DAYS)?,
            retry,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let ms: u64 = parse_or(lookup, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("WSAUTH_DATABASE_URL", "postgresql:///wsauth"),
        ("WSAUTH_AUTHORITY_URL", "https://authority.example/api/v1"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:4200");
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.cert_alias, "afipsdk");
        assert_eq!(cfg.cert_validity_days, 365);
        assert_eq!(cfg.authority_env, "dev");
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert!(cfg.authority_token.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("WSAUTH_RETRY_MAX_ATTEMPTS", "5"),
            ("WSAUTH_RETRY_DELAY_MS", "250"),
            ("WSAUTH_DEADLINE_MS", "9000"),
            ("WSAUTH_AUTHORITY_TOKEN", "tok"),
        ]);
        let cfg = ServerConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.delay, Duration::from_millis(250));
        assert_eq!(cfg.retry.overall_deadline, Some(Duration::from_secs(9)));
        assert_eq!(cfg.authority_token.as_deref(), Some("tok"));
        assert!(!format!("{cfg:?}").contains("tok\""));
    }

    #[test]
    fn missing_required_vars_fail() {
        let err = ServerConfig::from_lookup(lookup(&[REQUIRED[1]])).unwrap_err();
        assert!(err.to_string().contains("WSAUTH_DATABASE_URL"));
    }

    #[test]
    fn invalid_numbers_are_errors_not_defaults() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WSAUTH_RETRY_DELAY_MS", "soon"));
        let err = ServerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("WSAUTH_RETRY_DELAY_MS"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WSAUTH_RETRY_MAX_ATTEMPTS", "0"));
        assert!(ServerConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn malformed_authority_url_rejected() {
        let pairs = [
            ("WSAUTH_DATABASE_URL", "postgresql:///wsauth"),
            ("WSAUTH_AUTHORITY_URL", "not a url"),
        ];
        assert!(ServerConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
