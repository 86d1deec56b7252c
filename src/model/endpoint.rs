//! Endpoint records.

use serde::{Deserialize, Serialize};

use super::ids::{ConnectorId, EndpointId, TenantId};
use super::masking::FieldDefinition;
use super::query::QueryDescription;

/// A saved query exposed for repeated paginated execution.
///
/// The query description and field definitions are stored serialized, the
/// way the persistence layer keeps them. The engine deserializes on use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub tenant_id: TenantId,
    pub connector_id: ConnectorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_alias: Option<String>,
    /// Serialized [`QueryDescription`].
    pub query_config: String,
    /// Serialized `Vec<FieldDefinition>`; absent or `[]` exposes every column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_config: Option<String>,
}

impl Endpoint {
    pub fn new(
        id: EndpointId,
        tenant_id: TenantId,
        connector_id: ConnectorId,
        name: impl Into<String>,
        query: &QueryDescription,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            tenant_id,
            connector_id,
            name: name.into(),
            path_alias: None,
            query_config: serde_json::to_string(query)?,
            field_config: None,
        })
    }

    pub fn with_path_alias(mut self, alias: impl Into<String>) -> Self {
        self.path_alias = Some(alias.into());
        self
    }

    pub fn with_fields(mut self, fields: &[FieldDefinition]) -> Result<Self, serde_json::Error> {
        self.field_config = Some(serde_json::to_string(fields)?);
        Ok(self)
    }

    pub fn query_description(&self) -> Result<QueryDescription, serde_json::Error> {
        serde_json::from_str(&self.query_config)
    }

    /// Stored field config, if it defines at least one field.
    pub fn field_config(&self) -> Option<&str> {
        self.field_config
            .as_deref()
            .map(str::trim)
            .filter(|json| !json.is_empty() && *json != "[]" && *json != "null")
    }
}
