//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub okta_issuer: String,
    pub okta_client_id: String,
    pub okta_redirect_uri: String,
    pub user_directory_url: String,
    pub storage_path: PathBuf,
    pub demo_login_enabled: bool,
    pub mock_delay: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Identity Provider and Directory ---
        let okta_issuer = required("OKTA_ISSUER")?.trim_end_matches('/').to_string();
        let okta_client_id = required("OKTA_CLIENT_ID")?;
        let okta_redirect_uri =
            or_default("OKTA_REDIRECT_URI", "http://localhost:3000/login/callback");
        let user_directory_url = required("USER_DIRECTORY_URL")?
            .trim_end_matches('/')
            .to_string();
        for (key, value) in [
            ("OKTA_ISSUER", &okta_issuer),
            ("OKTA_REDIRECT_URI", &okta_redirect_uri),
            ("USER_DIRECTORY_URL", &user_directory_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))?;
        }

        // --- Storage and Demo Data ---
        let storage_path = PathBuf::from(or_default("STORAGE_PATH", "./data/session.json"));

        let demo_str = or_default("DEMO_LOGIN_ENABLED", "false");
        let demo_login_enabled = match demo_str.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "DEMO_LOGIN_ENABLED".to_string(),
                    format!("'{}' is not a boolean", demo_str),
                ))
            }
        };

        let mock_delay = Duration::from_millis(parse_number(&or_default("MOCK_DELAY_MS", "1000"), "MOCK_DELAY_MS")?);
        let http_timeout = Duration::from_secs(parse_number(&or_default("HTTP_TIMEOUT_SECS", "30"), "HTTP_TIMEOUT_SECS")?);

        Ok(Self {
            bind_address,
            log_level,
            okta_issuer,
            okta_client_id,
            okta_redirect_uri,
            user_directory_url,
            storage_path,
            demo_login_enabled,
            mock_delay,
            http_timeout,
        })
    }
}

fn parse_number(raw: &str, key: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("OKTA_ISSUER", "https://example.okta.com/oauth2/default/"),
        ("OKTA_CLIENT_ID", "client-123"),
        ("USER_DIRECTORY_URL", "https://directory.example.com"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.okta_issuer, "https://example.okta.com/oauth2/default");
        assert_eq!(
            config.okta_redirect_uri,
            "http://localhost:3000/login/callback"
        );
        assert_eq!(config.storage_path, PathBuf::from("./data/session.json"));
        assert!(!config.demo_login_enabled);
        assert_eq!(config.mock_delay, Duration::from_millis(1000));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[rstest]
    #[case("OKTA_ISSUER")]
    #[case("OKTA_CLIENT_ID")]
    #[case("USER_DIRECTORY_URL")]
    fn missing_required_var_is_reported(#[case] missing: &str) {
        let vars: Vec<_> = REQUIRED.into_iter().filter(|(k, _)| *k != missing).collect();
        match load(&vars) {
            Err(ConfigError::MissingVar(name)) => assert_eq!(name, missing),
            other => panic!("expected missing var, got {other:?}"),
        }
    }

    #[rstest]
    #[case("BIND_ADDRESS", "not-an-address")]
    #[case("RUST_LOG", "chatty")]
    #[case("DEMO_LOGIN_ENABLED", "maybe")]
    #[case("MOCK_DELAY_MS", "-5")]
    #[case("OKTA_REDIRECT_URI", "callback")]
    fn invalid_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        let mut vars = REQUIRED.to_vec();
        vars.push((key, value));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(k, _)) if k == key));
    }

    #[test]
    fn demo_login_and_delay_can_be_set() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("DEMO_LOGIN_ENABLED", "TRUE"), ("MOCK_DELAY_MS", "0")]);
        let config = load(&vars).unwrap();
        assert!(config.demo_login_enabled);
        assert!(config.mock_delay.is_zero());
    }
}
