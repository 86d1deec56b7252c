//! Query Execution Orchestrator.
//!
//! Entry point of the engine. A saved-endpoint query runs:
//!
//! ```text
//! cache lookup (tenant:endpoint) -> connector approval -> pooled source
//!   -> deserialize query -> schema -> build SQL -> bind page -> execute
//!   -> project fields / mask
//! ```
//!
//! A test query skips the endpoint lookup, caps its limit and returns the
//! generated SQL with the rows.
//!
//! Validation errors pass through unchanged. Execution failures are wrapped
//! with the endpoint or connector they ran for.

mod error;

pub use error::{ErrorKind, QueryError, QueryResult};

use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheStats, MetadataCache};
use crate::config::{EngineSettings, MaskingMode, Settings};
use crate::masking::{FieldProjector, MaskingService};
use crate::model::{
    Connector, ConnectorId, EndpointId, FieldDefinition, QueryDescription, Row, TenantId,
};
use crate::pool::{ConnectionPoolManager, DataSourceFactory};
use crate::repository::{ConnectorRepository, EndpointRepository, RepositoryError, ResourceKind};
use crate::sql::{NamedParam, Pagination, SqlBuilder};
use crate::validation::ValidationError;

/// Output of a test query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestQueryResult {
    /// Generated SQL, with named placeholders.
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<NamedParam>,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

/// Executes endpoint and test queries.
pub struct QueryEngine {
    endpoints: Arc<dyn EndpointRepository>,
    connectors: Arc<dyn ConnectorRepository>,
    pools: ConnectionPoolManager,
    cache: MetadataCache,
    masking: MaskingService,
    settings: EngineSettings,
}

impl QueryEngine {
    pub fn new(
        endpoints: Arc<dyn EndpointRepository>,
        connectors: Arc<dyn ConnectorRepository>,
        factory: Arc<dyn DataSourceFactory>,
        settings: &Settings,
    ) -> Self {
        Self {
            endpoints,
            connectors,
            pools: ConnectionPoolManager::new(factory),
            cache: MetadataCache::new(&settings.cache),
            masking: MaskingService::new(),
            settings: settings.engine.clone(),
        }
    }

    /// Run a saved endpoint's query for one page (0-indexed).
    pub fn execute_query(
        &self,
        tenant: &TenantId,
        endpoint_id: &EndpointId,
        page: u64,
        size: u64,
    ) -> QueryResult<Vec<Row>> {
        let span = tracing::info_span!("execute_query", %tenant, endpoint = %endpoint_id);
        let _enter = span.enter();

        let offset = self.page_offset(page, size)?;

        let endpoint = self.cache.get(tenant, endpoint_id, || {
            self.endpoints
                .find_endpoint(tenant, endpoint_id)?
                .ok_or_else(|| RepositoryError::endpoint_not_found(endpoint_id))
        })?;
        if &endpoint.tenant_id != tenant {
            tracing::warn!(owner = %endpoint.tenant_id, "endpoint requested by another tenant");
            return Err(QueryError::AccessDenied(ResourceKind::Endpoint));
        }

        let connector = self.find_connector(tenant, &endpoint.connector_id)?;
        ensure_usable(&connector)?;
        let source = self.pools.get_source(&connector)?;

        let corrupt = |what: &'static str| {
            move |source: serde_json::Error| QueryError::CorruptMetadata {
                kind: ResourceKind::Endpoint,
                id: endpoint_id.to_string(),
                what,
                source,
            }
        };
        let query = endpoint
            .query_description()
            .map_err(corrupt("query configuration"))?;
        let fields: Arc<Vec<FieldDefinition>> = match endpoint.field_config() {
            Some(raw) => self
                .cache
                .fields(raw)
                .map_err(corrupt("field configuration"))?,
            None => Arc::new(Vec::new()),
        };

        let dialect = source.dialect();
        let schema = SqlBuilder::resolve_schema(&connector.config, dialect)?;
        let builder = SqlBuilder::new(dialect);

        let (built, projector) = match self.settings.masking {
            MaskingMode::InSql if !fields.is_empty() => {
                let masked =
                    builder.build_masked(&query, &fields, Pagination::Placeholders, &schema)?;
                (
                    masked.query,
                    FieldProjector::projected_in_sql(fields, masked.masked),
                )
            }
            _ => (
                builder.build_sql(&query, Pagination::Placeholders, &schema)?,
                FieldProjector::new(fields),
            ),
        };
        let built = built.bind_page(size, offset);

        let rows = source
            .query(&built.sql, &built.params)
            .map_err(|source| QueryError::Execution {
                kind: ResourceKind::Endpoint,
                id: endpoint_id.to_string(),
                source,
            })?;
        tracing::info!(rows = rows.len(), page, size, "endpoint query executed");

        Ok(projector.project_all(&self.masking, rows))
    }

    /// Run an unsaved query against a connector.
    ///
    /// A limit that is unset or above `test_query_max_limit` is replaced by
    /// `default_page_size`.
    pub fn execute_test_query(
        &self,
        tenant: &TenantId,
        connector: &Connector,
        mut query: QueryDescription,
    ) -> QueryResult<TestQueryResult> {
        let span = tracing::info_span!("execute_test_query", %tenant, connector = %connector.id);
        let _enter = span.enter();

        if &connector.tenant_id != tenant {
            tracing::warn!(owner = %connector.tenant_id, "connector requested by another tenant");
            return Err(QueryError::AccessDenied(ResourceKind::Connector));
        }
        ensure_usable(connector)?;
        let source = self.pools.get_source(connector)?;

        if query
            .limit
            .map_or(true, |limit| limit > self.settings.test_query_max_limit)
        {
            query.limit = Some(self.settings.default_page_size);
        }

        let dialect = source.dialect();
        let schema = SqlBuilder::resolve_schema(&connector.config, dialect)?;
        let built = SqlBuilder::new(dialect).build_sql(&query, Pagination::Literal, &schema)?;

        let rows = source
            .query(&built.sql, &built.params)
            .map_err(|source| QueryError::Execution {
                kind: ResourceKind::Connector,
                id: connector.id.to_string(),
                source,
            })?;
        tracing::info!(rows = rows.len(), "test query executed");

        Ok(TestQueryResult {
            sql: built.sql,
            params: built.params,
            row_count: rows.len(),
            rows,
        })
    }

    /// Look up a connector the tenant owns.
    pub fn find_connector(&self, tenant: &TenantId, id: &ConnectorId) -> QueryResult<Connector> {
        let connector = self
            .connectors
            .find_connector(id)?
            .ok_or_else(|| RepositoryError::connector_not_found(id))?;
        if &connector.tenant_id != tenant {
            tracing::warn!(connector = %id, %tenant, "connector requested by another tenant");
            return Err(QueryError::AccessDenied(ResourceKind::Connector));
        }
        Ok(connector)
    }

    /// Drop cached metadata after an endpoint is updated or deleted.
    pub fn invalidate_endpoint(&self, tenant: &TenantId, endpoint: &EndpointId) {
        self.cache.invalidate(tenant, endpoint);
    }

    /// Close the connector's pool after its config changes or it is deleted.
    pub fn invalidate_connector(&self, connector: &ConnectorId) -> bool {
        self.pools.invalidate(connector)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn pools(&self) -> &ConnectionPoolManager {
        &self.pools
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Row offset for a 0-indexed page.
    fn page_offset(&self, page: u64, size: u64) -> QueryResult<u64> {
        if size == 0 || size > self.settings.max_page_size {
            return Err(ValidationError::InvalidPagination(format!(
                "size must be between 1 and {}",
                self.settings.max_page_size
            ))
            .into());
        }
        page.checked_mul(size).ok_or_else(|| {
            ValidationError::InvalidPagination(format!("page {} is out of range", page)).into()
        })
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("pools", &self.pools)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Only approved, active connectors may be queried.
fn ensure_usable(connector: &Connector) -> QueryResult<()> {
    if !connector.is_approved() {
        return Err(QueryError::NotApproved {
            name: connector.name.clone(),
        });
    }
    if !connector.active {
        return Err(QueryError::Inactive {
            name: connector.name.clone(),
        });
    }
    Ok(())
}
