//! Configuration module for dataport.
//!
//! Handles TOML settings, environment variables, and connector connection
//! resolution.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver};
pub use settings::{
    expand_env_vars, CacheSettings, EndpointSeed, EngineSettings, LoggingSettings, MaskingMode,
    PoolSettings, Settings, SettingsError, CONFIG_ENV,
};
