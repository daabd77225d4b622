use crate::login::PasswordScheme;
use axum_extra::extract::cookie::Key;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Environment variable that overrides `secret_key` from the config file
pub const SECRET_KEY_ENV: &str = "VIZBOARD_SECRET_KEY";

/// Minimum secret length accepted by the cookie signing key
const MIN_SECRET_BYTES: usize = 64;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("secret key must be at least {MIN_SECRET_BYTES} bytes, got {0}")]
    SecretKeyTooShort(usize),
}

/// Runtime configuration for the web application
///
/// Every field has a default, so an empty (or missing) TOML file yields a
/// working development setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind: SocketAddr,

    /// SQLite database holding the user table
    pub database_path: PathBuf,

    /// Root directory containing the `pages/` and `ml_pages/` templates
    pub template_dir: PathBuf,

    /// Directory served under `/static` and holding `sitemap.xml`
    pub static_dir: PathBuf,

    /// Directory uploaded datasets are written to
    pub upload_dir: PathBuf,

    /// Cookie signing secret (at least 64 bytes)
    pub secret_key: Option<String>,

    /// Lifetime of a login session in seconds
    pub session_ttl_secs: u64,

    /// How passwords are stored and compared
    pub password_scheme: PasswordScheme,

    /// Request body limit for the upload route
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_path: PathBuf::from("database/users.db"),
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("user_data"),
            secret_key: None,
            session_ttl_secs: 24 * 60 * 60,
            password_scheme: PasswordScheme::default(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment overrides
    ///
    /// # Errors
    /// * Returns an error if the file cannot be read or is not valid TOML
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(secret) = std::env::var(SECRET_KEY_ENV) {
            if !secret.is_empty() {
                config.secret_key = Some(secret);
            }
        }

        Ok(config)
    }

    /// Parse a TOML configuration file
    ///
    /// # Errors
    /// * Returns an error if the file cannot be read or is not valid TOML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Session lifetime as a `Duration`
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Build the cookie signing key
    ///
    /// Without a configured secret a random key is generated, which means
    /// sessions do not survive a restart.
    ///
    /// # Errors
    /// * Returns an error if the configured secret is shorter than 64 bytes
    pub fn signing_key(&self) -> Result<Key, ConfigError> {
        match &self.secret_key {
            Some(secret) => Key::try_from(secret.as_bytes())
                .map_err(|_| ConfigError::SecretKeyTooShort(secret.len())),
            None => {
                warn!("no secret_key configured; generating an ephemeral signing key");
                Ok(Key::generate())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("user_data"));
        assert_eq!(config.password_scheme, PasswordScheme::Plaintext);
        assert_eq!(config.session_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = Config::from_toml(
            r#"
            bind = "0.0.0.0:8080"
            upload_dir = "/tmp/uploads"
            password_scheme = "argon2"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.password_scheme, PasswordScheme::Argon2);
        assert_eq!(config.template_dir, PathBuf::from("templates"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let config = Config {
            secret_key: Some("too short".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            config.signing_key(),
            Err(ConfigError::SecretKeyTooShort(9))
        ));
    }

    #[test]
    fn long_secret_builds_a_key() {
        let config = Config {
            secret_key: Some("k".repeat(64)),
            ..Config::default()
        };
        assert!(config.signing_key().is_ok());
    }
}
