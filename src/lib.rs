//! # Dataport
//!
//! A dynamic query engine that exposes tenant database tables as read-only,
//! paginated, field-masked data endpoints.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          QueryEngine (execute_query / test query)        │
//! └─────────────────────────────────────────────────────────┘
//!        │                │                    │
//!        ▼ [cache]        ▼ [sql]              ▼ [pool]
//! ┌──────────────┐ ┌──────────────────┐ ┌─────────────────────┐
//! │ MetadataCache│ │ SqlBuilder       │ │ ConnectionPoolManager│
//! │ tenant:id    │ │ + QueryValidator │ │ one pool / connector │
//! └──────────────┘ └──────────────────┘ └─────────────────────┘
//!                                              │
//!                                              ▼ rows
//! ┌─────────────────────────────────────────────────────────┐
//! │       FieldProjector + MaskingService (post-fetch)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers from tenant configuration are validated against an allow-list
//! and a keyword blocklist before they are embedded; filter values are always
//! bound as parameters.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod masking;
pub mod model;
pub mod pool;
pub mod repository;
pub mod sql;
pub mod validation;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::engine::{ErrorKind, QueryEngine, QueryError, QueryResult, TestQueryResult};
    pub use crate::masking::MaskingService;
    pub use crate::model::{
        ColumnSpec, Connector, ConnectorConfig, ConnectorId, ConnectorStatus, Endpoint,
        EndpointId, FieldDefinition, FilterSpec, JoinSpec, MaskingConfig, MaskingType,
        QueryDescription, QueryMode, Row, SortSpec, TenantId,
    };
    pub use crate::pool::{ConnectionPoolManager, DataSource, DataSourceFactory};
    pub use crate::repository::{ConnectorRepository, EndpointRepository, InMemoryRepository};
    pub use crate::sql::{BuiltQuery, Dialect, Pagination, SqlBuilder, SqlDialect};
    pub use crate::validation::{QueryValidator, ValidationError};
}

pub use engine::{QueryEngine, QueryError};
pub use sql::Dialect;
