//! TOML-based configuration for dataport.
//!
//! Supports a config file (dataport.toml) with environment variable expansion
//! in connector settings.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! default_page_size = 10
//! max_page_size = 1000
//! test_query_max_limit = 100
//! masking = "post_fetch"
//!
//! [pool]
//! max_size = 10
//! connection_timeout_ms = 5000
//! statement_timeout_ms = 30000
//!
//! [cache]
//! endpoint_capacity = 1000
//! endpoint_ttl_seconds = 600
//!
//! [logging]
//! filter = "info,dataport=debug"
//!
//! [[connectors]]
//! id = "6f1c2f1e-8a55-4c8e-9a51-7d3f5e0b9c11"
//! tenant_id = "acme"
//! name = "warehouse"
//! status = "APPROVED"
//!
//! [connectors.config]
//! host = "db.internal"
//! databaseName = "sales"
//! username = "reader"
//! password = "${WAREHOUSE_PASSWORD}"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::{
    Connector, ConnectorConfig, ConnectorId, Endpoint, EndpointId, FieldDefinition,
    QueryDescription, TenantId,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DATAPORT_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid endpoint seed '{name}': {source}")]
    InvalidEndpoint {
        name: String,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub pool: PoolSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,

    /// Connector records to seed the in-memory repository with.
    pub connectors: Vec<Connector>,

    /// Endpoint records to seed the in-memory repository with.
    pub endpoints: Vec<EndpointSeed>,
}

/// Where field masking happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskingMode {
    /// Mask fetched values in the engine.
    #[default]
    PostFetch,
    /// Compile FIXED/REGEX masks into the select list where the dialect can.
    InSql,
}

/// Query engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Page size applied to test queries without a usable limit.
    pub default_page_size: u64,

    /// Largest accepted page size.
    pub max_page_size: u64,

    /// Test-query limits above this fall back to `default_page_size`.
    pub test_query_max_limit: u64,

    pub masking: MaskingMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 1000,
            test_query_max_limit: 100,
            masking: MaskingMode::PostFetch,
        }
    }
}

/// Connection pool settings, applied to every connector pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of connections per pool.
    pub max_size: u32,

    /// Idle connections kept open per pool.
    pub min_idle: Option<u32>,

    /// How long a checkout (or the initial connect) may wait.
    pub connection_timeout_ms: u64,

    /// Postgres `statement_timeout` for pooled sessions; SQLite busy timeout.
    pub statement_timeout_ms: u64,

    /// Idle connections are closed after this long.
    pub idle_timeout_ms: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: Some(1),
            connection_timeout_ms: 5_000,
            statement_timeout_ms: 30_000,
            idle_timeout_ms: Some(600_000),
        }
    }
}

impl PoolSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

/// Metadata cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub endpoint_capacity: u64,
    pub endpoint_ttl_seconds: u64,
    /// Parsed field-definition lists.
    pub field_capacity: u64,
    pub field_ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            endpoint_capacity: 1000,
            endpoint_ttl_seconds: 600,
            field_capacity: 500,
            field_ttl_seconds: 3600,
        }
    }
}

impl CacheSettings {
    pub fn endpoint_ttl(&self) -> Duration {
        Duration::from_secs(self.endpoint_ttl_seconds)
    }

    pub fn field_ttl(&self) -> Duration {
        Duration::from_secs(self.field_ttl_seconds)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// An endpoint as written in the config file, with its query and fields
/// inline rather than serialized.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointSeed {
    pub id: EndpointId,
    pub tenant_id: TenantId,
    pub connector_id: ConnectorId,
    pub name: String,
    #[serde(default)]
    pub path_alias: Option<String>,
    pub query: QueryDescription,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl EndpointSeed {
    pub fn to_endpoint(&self) -> Result<Endpoint, SettingsError> {
        let invalid = |source| SettingsError::InvalidEndpoint {
            name: self.name.clone(),
            source,
        };

        let mut endpoint = Endpoint::new(
            self.id,
            self.tenant_id.clone(),
            self.connector_id,
            self.name.clone(),
            &self.query,
        )
        .map_err(invalid)?;
        endpoint.path_alias = self.path_alias.clone();
        if !self.fields.is_empty() {
            endpoint = endpoint.with_fields(&self.fields).map_err(invalid)?;
        }
        Ok(endpoint)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse, expand environment variables, and validate.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.expand_connector_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DATAPORT_CONFIG`
    /// 2. `./dataport.toml`
    /// 3. `~/.config/dataport/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dataport.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dataport").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let engine = &self.engine;
        if engine.max_page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "engine.max_page_size must be at least 1".to_string(),
            ));
        }
        if engine.default_page_size == 0 || engine.default_page_size > engine.max_page_size {
            return Err(SettingsError::InvalidConfig(format!(
                "engine.default_page_size must be between 1 and {}",
                engine.max_page_size
            )));
        }
        if engine.test_query_max_limit == 0 {
            return Err(SettingsError::InvalidConfig(
                "engine.test_query_max_limit must be at least 1".to_string(),
            ));
        }
        if self.pool.max_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "pool.max_size must be at least 1".to_string(),
            ));
        }
        if matches!(self.pool.min_idle, Some(min_idle) if min_idle > self.pool.max_size) {
            return Err(SettingsError::InvalidConfig(
                "pool.min_idle must not exceed pool.max_size".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint seeds as stored records.
    pub fn seed_endpoints(&self) -> Result<Vec<Endpoint>, SettingsError> {
        self.endpoints.iter().map(EndpointSeed::to_endpoint).collect()
    }

    fn expand_connector_env(&mut self) -> Result<(), SettingsError> {
        for connector in &mut self.connectors {
            connector.config = expand_config(&connector.config)?;
        }
        Ok(())
    }
}

fn expand_config(config: &ConnectorConfig) -> Result<ConnectorConfig, SettingsError> {
    config
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => Value::String(expand_env_vars(s)?),
                other => other.clone(),
            };
            Ok::<_, SettingsError>((key.clone(), value))
        })
        .collect()
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
