//! Process configuration read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;

use idlink_observability::LogFormat;

use crate::resolver::MergeStrategy;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            message: message.into(),
        }
    }
}

/// Runtime settings for the identify service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub merge_strategy: MergeStrategy,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database_url: None,
            merge_strategy: MergeStrategy::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Read `BACKEND_PORT`, `BIND_ADDR`, `DATABASE_URL`, `MERGE_STRATEGY` and
    /// `LOG_FORMAT` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] over an arbitrary variable source.
    ///
    /// Unset and blank variables fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = AppConfig::default();

        if let Some(port) = get("BACKEND_PORT") {
            config.port = port
                .parse()
                .map_err(|e| ConfigError::invalid("BACKEND_PORT", format!("'{port}': {e}")))?;
        }
        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", format!("'{addr}': {e}")))?;
        }
        if let Some(strategy) = get("MERGE_STRATEGY") {
            config.merge_strategy = strategy
                .parse::<MergeStrategy>()
                .map_err(|e| ConfigError::invalid("MERGE_STRATEGY", e.to_string()))?;
        }
        if let Some(format) = get("LOG_FORMAT") {
            config.log_format = format
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid("LOG_FORMAT", e.to_string()))?;
        }
        config.database_url = get("DATABASE_URL");

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.merge_strategy, MergeStrategy::Reparent);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("BACKEND_PORT", "8081"),
            ("BIND_ADDR", "127.0.0.1"),
            ("DATABASE_URL", "postgres://idlink@localhost/idlink"),
            ("MERGE_STRATEGY", "flip_only"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8081");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://idlink@localhost/idlink")
        );
        assert_eq!(config.merge_strategy, MergeStrategy::FlipOnly);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("BACKEND_PORT", "  "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (var, value) in [
            ("BACKEND_PORT", "eighty"),
            ("BACKEND_PORT", "70000"),
            ("BIND_ADDR", "localhost:1"),
            ("MERGE_STRATEGY", "squash"),
            ("LOG_FORMAT", "xml"),
        ] {
            match config_from(&[(var, value)]) {
                Err(ConfigError::Invalid { var: got, .. }) => assert_eq!(got, var),
                other => panic!("expected error for {var}={value}, got {other:?}"),
            }
        }
    }
}
