//! r2d2-backed data source factory.

use std::fmt;
use std::sync::Arc;

use super::{DataSource, DataSourceFactory, PoolError, PostgresSource, SqliteSource};
use crate::config::{ConnectionConfig, Driver, PoolSettings};
use crate::crypto::Decryptor;
use crate::model::Connector;

/// Resolves a connector's settings and opens a pool for its driver.
pub struct R2d2DataSourceFactory {
    decryptor: Arc<dyn Decryptor>,
    settings: PoolSettings,
}

impl R2d2DataSourceFactory {
    pub fn new(decryptor: Arc<dyn Decryptor>, settings: PoolSettings) -> Self {
        Self {
            decryptor,
            settings,
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

impl DataSourceFactory for R2d2DataSourceFactory {
    fn create(&self, connector: &Connector) -> Result<Arc<dyn DataSource>, PoolError> {
        let config = ConnectionConfig::resolve(&connector.config, self.decryptor.as_ref())
            .map_err(|e| PoolError::creation(connector.id, e))?;

        tracing::debug!(
            connector = %connector.id,
            driver = %config.driver,
            max_size = self.settings.max_size,
            "opening pool"
        );

        let source: Arc<dyn DataSource> = match config.driver {
            Driver::Postgres => Arc::new(
                PostgresSource::connect(&config, &self.settings)
                    .map_err(|e| PoolError::creation(connector.id, e))?,
            ),
            Driver::Sqlite => Arc::new(
                SqliteSource::open(&config, &self.settings)
                    .map_err(|e| PoolError::creation(connector.id, e))?,
            ),
        };
        Ok(source)
    }
}

impl fmt::Debug for R2d2DataSourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2d2DataSourceFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
