//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use checkout::CommitConfig;
use domain::PricingConfig;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `CATALOG_PATH`: JSON catalog file
/// - `KNOWN_VENDORS`: comma-separated vendor directory; any vendor is accepted when unset
/// - `KNOWN_SUBJECTS`: comma-separated identities registered in the in-memory claims store
/// - `PRICING_TAX_RATE`: e.g. `0.05`
/// - `PRICING_SHIPPING_RATES`: `ORIGIN=rate,...`, merged over the defaults
/// - `COMMIT_MAX_ATTEMPTS`, `COMMIT_BACKOFF_MS`
/// - `IDEMPOTENCY_WAIT_MS`, `IDEMPOTENCY_LEASE_SECS`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub known_vendors: Option<Vec<String>>,
    pub known_subjects: Vec<String>,
    pub pricing: PricingConfig,
    pub commit: CommitConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mut pricing = defaults.pricing;
        if let Some(rate) = var("PRICING_TAX_RATE") {
            pricing = pricing.with_tax_rate(parse("PRICING_TAX_RATE", &rate)?);
        }
        if let Some(rates) = var("PRICING_SHIPPING_RATES") {
            for (origin, rate) in parse_rates(&rates)? {
                pricing = pricing.with_shipping_rate(origin, rate);
            }
        }

        let mut commit = defaults.commit;
        if let Some(attempts) = var("COMMIT_MAX_ATTEMPTS") {
            commit.retry.max_attempts = parse("COMMIT_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(backoff) = var("COMMIT_BACKOFF_MS") {
            commit.retry.base_delay = Duration::from_millis(parse("COMMIT_BACKOFF_MS", &backoff)?);
        }
        if let Some(wait) = var("IDEMPOTENCY_WAIT_MS") {
            commit.idempotency_wait = Duration::from_millis(parse("IDEMPOTENCY_WAIT_MS", &wait)?);
        }
        if let Some(lease) = var("IDEMPOTENCY_LEASE_SECS") {
            commit.idempotency_lease = Duration::from_secs(parse("IDEMPOTENCY_LEASE_SECS", &lease)?);
        }

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected 'pretty' or 'json', got '{other}'"),
                });
            }
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: match var("PORT") {
                Some(port) => parse("PORT", &port)?,
                None => defaults.port,
            },
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            catalog_path: var("CATALOG_PATH").map(PathBuf::from),
            known_vendors: var("KNOWN_VENDORS").map(|v| split_list(&v)),
            known_subjects: var("KNOWN_SUBJECTS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            pricing,
            commit,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            catalog_path: None,
            known_vendors: None,
            known_subjects: Vec::new(),
            pricing: PricingConfig::default(),
            commit: CommitConfig::default(),
        }
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_rates(value: &str) -> Result<Vec<(String, Decimal)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (origin, rate) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
                name: "PRICING_SHIPPING_RATES",
                reason: format!("expected ORIGIN=rate, got '{entry}'"),
            })?;
            Ok((origin.trim().to_string(), parse("PRICING_SHIPPING_RATES", rate)?))
        })
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout::RetryPolicy;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert!(config.known_vendors.is_none());
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.commit.retry, RetryPolicy::default());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("KNOWN_VENDORS", "vendor-a, vendor-b,"),
            ("PRICING_TAX_RATE", "0.1"),
            ("PRICING_SHIPPING_RATES", "shein=9.5, AMAZON_UAE=11"),
            ("COMMIT_MAX_ATTEMPTS", "5"),
            ("IDEMPOTENCY_WAIT_MS", "750"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.known_vendors,
            Some(vec!["vendor-a".to_string(), "vendor-b".to_string()])
        );
        assert_eq!(config.pricing.tax_rate, Decimal::new(1, 1));
        assert_eq!(config.pricing.shipping_rates["SHEIN"], Decimal::new(95, 1));
        assert_eq!(config.pricing.shipping_rates["AMAZON_UAE"], Decimal::from(11));
        assert_eq!(config.pricing.shipping_rates["ALIBABA"], Decimal::from(15));
        assert_eq!(config.commit.retry.max_attempts, 5);
        assert_eq!(config.commit.idempotency_wait, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = config_from(&[("PRICING_SHIPPING_RATES", "SHEIN")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PRICING_SHIPPING_RATES", .. }));
    }
}
