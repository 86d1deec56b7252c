//! Data model consumed and produced by the query engine.
//!
//! These are plain serde types. Connector and endpoint records are owned by
//! the surrounding CRUD layer; the engine only reads them.
//!
//! - [`QueryDescription`] - declarative builder-mode or raw-SQL query
//! - [`FieldDefinition`] / [`MaskingConfig`] - per-field exposure and masking
//! - [`Connector`] - external database registration with its approval state
//! - [`Endpoint`] - saved query exposed for paginated execution

pub mod connector;
pub mod endpoint;
pub mod ids;
pub mod masking;
pub mod query;

pub use connector::{Connector, ConnectorConfig, ConnectorStatus};
pub use endpoint::Endpoint;
pub use ids::{ConnectorId, EndpointId, TenantId};
pub use masking::{FieldDefinition, MaskingConfig, MaskingType};
pub use query::{ColumnSpec, FilterSpec, JoinSpec, QueryDescription, QueryMode, SortSpec};

use serde::{Deserialize, Deserializer};

/// One result row: output column name to value, in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Deserialize a list that may be given as `null`.
pub(crate) fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
