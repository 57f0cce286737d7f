//! Configuration module for the Tulen backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key the auth gateway presents on every API call
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails only when `TULEN_BIND_ADDR` is set to something that is not a socket address.
    pub fn from_env() -> Result<Self, AddrParseError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("TULEN_API_PSK")
            .ok()
            .filter(|psk| !psk.trim().is_empty());

        let db_path = env::var("TULEN_DB_PATH")
            .unwrap_or_else(|_| "./data/tulen.sqlite".to_string())
            .into();

        let bind_addr = env::var("TULEN_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = env::var("TULEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test: the process environment is shared between test threads.
    #[test]
    fn test_config_from_env() {
        env::remove_var("TULEN_API_PSK");
        env::remove_var("TULEN_DB_PATH");
        env::remove_var("TULEN_BIND_ADDR");
        env::remove_var("TULEN_LOG_LEVEL");

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/tulen.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");

        env::set_var("TULEN_BIND_ADDR", "not-an-address");
        assert!(Config::from_env().is_err());

        env::set_var("TULEN_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("TULEN_API_PSK", "   ");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert!(config.api_psk.is_none());

        env::remove_var("TULEN_BIND_ADDR");
        env::remove_var("TULEN_API_PSK");
    }
}
