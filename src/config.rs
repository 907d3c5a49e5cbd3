use std::env;
use std::net::SocketAddr;
use thiserror::Error;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const DATABASE_NAME_VAR: &str = "DATABASE_NAME";
pub const PORT_VAR: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a port number, got {0:?}")]
    InvalidPort(String),
}

/// Process settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup(PORT_VAR) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        Ok(Config {
            database_url: lookup(DATABASE_URL_VAR).filter(|v| !v.is_empty()),
            database_name: lookup(DATABASE_NAME_VAR).filter(|v| !v.is_empty()),
            port,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_name, None);
        assert_eq!(config.addr().to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn reads_database_settings_and_port() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://center.db"),
            ("DATABASE_NAME", "center"),
            ("PORT", "9100"),
        ]))
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("sqlite://center.db"));
        assert_eq!(config.database_name.as_deref(), Some("center"));
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn empty_values_count_as_missing() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "")])).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn rejects_garbage_port() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(raw) if raw == "eighty"));
    }
}
