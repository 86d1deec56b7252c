//! Connector connection resolution.
//!
//! Turns a connector's free-form config map into a driver, a URL and
//! credentials. Recognised keys:
//!
//! - `driver` / `driver_class`: `postgres`, `postgresql`, `org.postgresql.Driver`,
//!   `sqlite`, `sqlite3`, `org.sqlite.JDBC`
//! - `url`: takes precedence over the parts below; a leading `jdbc:` is stripped
//! - `host`, `port` (default 5432), `databaseName`
//! - `user` or `username`
//! - `encrypted_password` (decrypted) or `password`
//!
//! When no driver is given it is inferred from the URL scheme, else Postgres.

use std::fmt;

use crate::crypto::{CryptoError, Decryptor};
use crate::model::ConnectorConfig;
use crate::sql::Dialect;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required connector setting: {0}")]
    MissingSetting(&'static str),

    #[error("Unsupported driver: {0}. Supported: postgres, sqlite")]
    UnsupportedDriver(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Failed to decrypt connector password: {0}")]
    Decryption(#[from] CryptoError),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// PostgreSQL over TCP
    Postgres,
    /// SQLite (file or in-memory)
    Sqlite,
}

impl Driver {
    /// Parse driver from a short name or driver class.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" | "org.postgresql.driver" => Ok(Driver::Postgres),
            "sqlite" | "sqlite3" | "org.sqlite.jdbc" => Ok(Driver::Sqlite),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    /// Infer the driver from a URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = strip_jdbc(url).to_lowercase();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Driver::Postgres)
        } else if url.starts_with("sqlite:") {
            Some(Driver::Sqlite)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Get the default port for this driver.
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            Driver::Sqlite => 0, // Not applicable
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Driver::Postgres => Dialect::Postgres,
            Driver::Sqlite => Dialect::Sqlite,
        }
    }

    /// Driver named by the config, else inferred from its URL, else Postgres.
    pub fn resolve(config: &ConnectorConfig) -> Result<Self, ConnectionError> {
        if let Some(name) = config
            .get_str("driver")
            .or_else(|| config.get_str("driver_class"))
            .filter(|name| !name.trim().is_empty())
        {
            return Driver::from_str(&name);
        }
        Ok(config
            .get_str("url")
            .and_then(|url| Driver::from_url(&url))
            .unwrap_or(Driver::Postgres))
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved connection settings for one connector.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// Postgres URL, or SQLite URL (`sqlite:<path>`).
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectionConfig {
    /// Resolve a connector's config, decrypting the password when stored
    /// encrypted.
    pub fn resolve(
        config: &ConnectorConfig,
        decryptor: &dyn Decryptor,
    ) -> Result<Self, ConnectionError> {
        let driver = Driver::resolve(config)?;

        let url = match config.get_str("url").filter(|url| !url.trim().is_empty()) {
            Some(url) => strip_jdbc(url.trim()).to_string(),
            None => match driver {
                Driver::Postgres => postgres_url(config, driver)?,
                Driver::Sqlite => format!(
                    "sqlite:{}",
                    config
                        .get_str("databaseName")
                        .ok_or(ConnectionError::MissingSetting("databaseName"))?
                ),
            },
        };

        let username = config.get_str("user").or_else(|| config.get_str("username"));

        let password = match config.get_str("encrypted_password") {
            Some(ciphertext) => Some(decryptor.decrypt(&ciphertext)?),
            None => config.get_str("password"),
        };

        Ok(Self {
            driver,
            url,
            username,
            password,
        })
    }

    /// SQLite database path (`:memory:` for in-memory).
    pub fn sqlite_path(&self) -> &str {
        let path = self.url.strip_prefix("sqlite:").unwrap_or(&self.url);
        path.strip_prefix("//").unwrap_or(path)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

fn strip_jdbc(url: &str) -> &str {
    url.strip_prefix("jdbc:").unwrap_or(url)
}

fn postgres_url(config: &ConnectorConfig, driver: Driver) -> Result<String, ConnectionError> {
    let host = config
        .get_str("host")
        .ok_or(ConnectionError::MissingSetting("host"))?;
    let database = config
        .get_str("databaseName")
        .ok_or(ConnectionError::MissingSetting("databaseName"))?;
    let port = match config.get_str("port") {
        Some(port) => port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConnectionError::InvalidPort(port.clone()))?,
        None => driver.default_port(),
    };
    Ok(format!("postgresql://{}:{}/{}", host, port, database))
}
