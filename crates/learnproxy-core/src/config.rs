//! Config Loader (§4.10, §6): environment-variable configuration into a
//! typed [`AppConfig`].

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Whether the dispatcher forwards to an upstream or serves synthetic
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Proxy,
    Mock,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Proxy => "proxy",
            Self::Mock => "mock",
        })
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "proxy" => Ok(Self::Proxy),
            "mock" => Ok(Self::Mock),
            other => Err(Error::config(format!("MODE must be \"proxy\" or \"mock\", got \"{other}\""))),
        }
    }
}

/// Whether a forward failure falls back to a synthesized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failover {
    On,
    Off,
}

impl FromStr for Failover {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(Error::config(format!("FAILOVER must be \"on\" or \"off\", got \"{other}\""))),
        }
    }
}

impl Failover {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Fully resolved runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub target_url: Option<url::Url>,
    pub db_path: String,
    pub listen_addr: String,
    pub mode: RunMode,
    pub failover: Failover,
}

const DEFAULT_DB_PATH: &str = "./learnproxy-data.json";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

impl AppConfig {
    /// Load configuration from environment variables, applying defaults and
    /// validating cross-field constraints (`TARGET_URL` is required only in
    /// proxy mode).
    pub fn from_env() -> Result<Self> {
        Self::from_getter(|key| std::env::var(key).ok())
    }

    /// Testable indirection over the environment so config loading can be
    /// exercised without mutating real process state.
    pub fn from_getter(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = match get("MODE") {
            Some(raw) => raw.parse()?,
            None => RunMode::Proxy,
        };
        let failover = match get("FAILOVER") {
            Some(raw) => raw.parse()?,
            None => Failover::On,
        };
        let db_path = get("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let listen_addr = get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let target_url = match get("TARGET_URL") {
            Some(raw) => Some(url::Url::parse(&raw)?),
            None => None,
        };

        if mode == RunMode::Proxy && target_url.is_none() {
            return Err(Error::config("TARGET_URL is required when MODE=proxy"));
        }

        Ok(Self { target_url, db_path, listen_addr, mode, failover })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn getter(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key: &str| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_getter(getter(&[("TARGET_URL", "http://upstream.local")])).unwrap();
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        assert_eq!(cfg.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(cfg.mode, RunMode::Proxy);
        assert!(cfg.failover.is_enabled());
    }

    #[test]
    fn proxy_mode_without_target_url_is_a_config_error() {
        let err = AppConfig::from_getter(getter(&[])).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn mock_mode_does_not_require_target_url() {
        let cfg = AppConfig::from_getter(getter(&[("MODE", "mock")])).unwrap();
        assert_eq!(cfg.mode, RunMode::Mock);
        assert!(cfg.target_url.is_none());
    }

    #[test]
    fn invalid_mode_value_is_rejected() {
        let err = AppConfig::from_getter(getter(&[("MODE", "bogus")])).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn failover_off_is_parsed() {
        let cfg = AppConfig::from_getter(getter(&[("MODE", "mock"), ("FAILOVER", "off")])).unwrap();
        assert!(!cfg.failover.is_enabled());
    }
}
