//! Connection Pool Manager.
//!
//! One pooled [`DataSource`] per connector, created lazily on first use and
//! kept until the connector is invalidated. Creation is delegated to a
//! [`DataSourceFactory`] so that tests can count and fake it.
//!
//! Approval is not checked here; callers gate on [`Connector::is_approved`]
//! before asking for a source. Inactive connectors are refused.

mod factory;
mod postgres_source;
mod sqlite_source;

pub use factory::R2d2DataSourceFactory;
pub use postgres_source::PostgresSource;
pub use sqlite_source::SqliteSource;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::model::{Connector, ConnectorId, Row};
use crate::sql::{Dialect, NamedParam};

/// Errors raised while running a statement against a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("data source is closed")]
    Closed,
}

/// Errors raised while obtaining a source for a connector.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Connector {0} is inactive")]
    Inactive(ConnectorId),

    #[error("Failed to create connection pool for connector {connector}: {source}")]
    Creation {
        connector: ConnectorId,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl PoolError {
    pub fn creation(
        connector: ConnectorId,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        PoolError::Creation {
            connector,
            source: source.into(),
        }
    }
}

/// A pooled connection to one connector's database.
///
/// Each call checks a connection out for the duration of one statement.
pub trait DataSource: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run a read statement with named placeholders and return its rows in
    /// select-list order.
    fn query(&self, sql: &str, params: &[NamedParam]) -> Result<Vec<Row>, SourceError>;
}

/// Builds a data source for a connector.
pub trait DataSourceFactory: Send + Sync {
    fn create(&self, connector: &Connector) -> Result<Arc<dyn DataSource>, PoolError>;
}

/// Lazily-created data sources keyed by connector.
pub struct ConnectionPoolManager {
    factory: Arc<dyn DataSourceFactory>,
    sources: DashMap<ConnectorId, Slot>,
}

/// Per-connector cell; filled outside the map lock.
type Slot = Arc<OnceCell<Arc<dyn DataSource>>>;

impl ConnectionPoolManager {
    pub fn new(factory: Arc<dyn DataSourceFactory>) -> Self {
        Self {
            factory,
            sources: DashMap::new(),
        }
    }

    /// Get the connector's source, creating it on first use.
    ///
    /// Concurrent first calls for the same connector create at most one
    /// source: they share one slot and wait on it while the factory runs.
    /// The map itself is only locked to fetch the slot, so a slow connect
    /// never blocks other connectors. A failed creation leaves nothing
    /// cached.
    pub fn get_source(&self, connector: &Connector) -> Result<Arc<dyn DataSource>, PoolError> {
        if !connector.active {
            return Err(PoolError::Inactive(connector.id));
        }

        let slot = self.slot(&connector.id);
        let created = slot.get_or_try_init(|| {
            tracing::info!(connector = %connector.id, name = %connector.name, "creating connection pool");
            self.factory.create(connector)
        });

        match created {
            Ok(source) => Ok(Arc::clone(source)),
            Err(e) => {
                self.sources.remove_if(&connector.id, |_, cached| {
                    Arc::ptr_eq(cached, &slot) && cached.get().is_none()
                });
                Err(e)
            }
        }
    }

    fn slot(&self, connector: &ConnectorId) -> Slot {
        if let Some(slot) = self.sources.get(connector) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.sources.entry(*connector).or_default().value())
    }

    /// Drop the connector's source. In-flight queries keep their handle; the
    /// pool closes once the last one finishes.
    ///
    /// Returns whether a source was cached.
    pub fn invalidate(&self, connector: &ConnectorId) -> bool {
        let removed = self
            .sources
            .remove(connector)
            .is_some_and(|(_, slot)| slot.get().is_some());
        if removed {
            tracing::info!(connector = %connector, "closed connection pool");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        let count = self.len();
        self.sources.clear();
        tracing::info!(count, "closed all connection pools");
    }

    pub fn is_cached(&self, connector: &ConnectorId) -> bool {
        self.sources
            .get(connector)
            .is_some_and(|slot| slot.value().get().is_some())
    }

    pub fn len(&self) -> usize {
        self.sources
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ConnectionPoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPoolManager")
            .field("pools", &self.sources.len())
            .finish_non_exhaustive()
    }
}
