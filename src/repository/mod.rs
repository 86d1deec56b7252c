//! Connector and endpoint lookups.
//!
//! The engine reads connector and endpoint records through these traits; the
//! system of record lives elsewhere. [`InMemoryRepository`] backs the CLI and
//! tests.

use std::fmt;

use dashmap::DashMap;
use thiserror::Error;

use crate::config::{Settings, SettingsError};
use crate::model::{Connector, ConnectorId, Endpoint, EndpointId, TenantId};

/// Kind of record, used in lookup and access errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Endpoint,
    Connector,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Endpoint => write!(f, "Data endpoint"),
            ResourceKind::Connector => write!(f, "Connector"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn endpoint_not_found(id: &EndpointId) -> Self {
        RepositoryError::NotFound {
            kind: ResourceKind::Endpoint,
            id: id.to_string(),
        }
    }

    pub fn connector_not_found(id: &ConnectorId) -> Self {
        RepositoryError::NotFound {
            kind: ResourceKind::Connector,
            id: id.to_string(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Endpoint records, looked up within a tenant.
pub trait EndpointRepository: Send + Sync {
    fn find_endpoint(
        &self,
        tenant: &TenantId,
        id: &EndpointId,
    ) -> RepositoryResult<Option<Endpoint>>;
}

/// Connector records.
pub trait ConnectorRepository: Send + Sync {
    fn find_connector(&self, id: &ConnectorId) -> RepositoryResult<Option<Connector>>;
}

/// Concurrent in-memory store for both record kinds.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    connectors: DashMap<ConnectorId, Connector>,
    endpoints: DashMap<EndpointId, Endpoint>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the `[[connectors]]` and `[[endpoints]]` config sections.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let repo = Self::new();
        for connector in &settings.connectors {
            repo.upsert_connector(connector.clone());
        }
        for endpoint in settings.seed_endpoints()? {
            repo.upsert_endpoint(endpoint);
        }
        Ok(repo)
    }

    pub fn upsert_connector(&self, connector: Connector) {
        self.connectors.insert(connector.id, connector);
    }

    pub fn remove_connector(&self, id: &ConnectorId) -> Option<Connector> {
        self.connectors.remove(id).map(|(_, connector)| connector)
    }

    pub fn upsert_endpoint(&self, endpoint: Endpoint) {
        self.endpoints.insert(endpoint.id, endpoint);
    }

    pub fn remove_endpoint(&self, id: &EndpointId) -> Option<Endpoint> {
        self.endpoints.remove(id).map(|(_, endpoint)| endpoint)
    }

    pub fn connectors(&self) -> Vec<Connector> {
        let mut connectors: Vec<Connector> =
            self.connectors.iter().map(|e| e.value().clone()).collect();
        connectors.sort_by(|a, b| a.name.cmp(&b.name));
        connectors
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> =
            self.endpoints.iter().map(|e| e.value().clone()).collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        endpoints
    }
}

impl EndpointRepository for InMemoryRepository {
    fn find_endpoint(
        &self,
        tenant: &TenantId,
        id: &EndpointId,
    ) -> RepositoryResult<Option<Endpoint>> {
        Ok(self
            .endpoints
            .get(id)
            .filter(|endpoint| &endpoint.tenant_id == tenant)
            .map(|endpoint| endpoint.value().clone()))
    }
}

impl ConnectorRepository for InMemoryRepository {
    fn find_connector(&self, id: &ConnectorId) -> RepositoryResult<Option<Connector>> {
        Ok(self.connectors.get(id).map(|c| c.value().clone()))
    }
}
