//! Connector records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ConnectorId, TenantId};

/// Connector approval lifecycle: INIT -> APPROVED | REJECTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorStatus {
    #[default]
    Init,
    Approved,
    Rejected,
}

impl ConnectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorStatus::Init => "INIT",
            ConnectorStatus::Approved => "APPROVED",
            ConnectorStatus::Rejected => "REJECTED",
        }
    }
}

/// Free-form connection settings as registered by the tenant.
///
/// Recognised keys: `url`, `host`, `port`, `databaseName`, `user`,
/// `username`, `password`, `encrypted_password`, `driver`, `driver_class`,
/// `schema`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorConfig(BTreeMap<String, Value>);

impl ConnectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String view of a scalar value. Numbers and booleans are rendered,
    /// `null`, arrays and objects are treated as absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for ConnectorConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A registered external database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub status: ConnectorStatus,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub config: ConnectorConfig,
}

fn default_active() -> bool {
    true
}

impl Connector {
    /// A new, active connector awaiting approval.
    pub fn new(
        id: ConnectorId,
        tenant_id: TenantId,
        name: impl Into<String>,
        config: ConnectorConfig,
    ) -> Self {
        Self {
            id,
            tenant_id,
            name: name.into(),
            status: ConnectorStatus::Init,
            active: true,
            config,
        }
    }

    pub fn approve(&mut self) {
        self.status = ConnectorStatus::Approved;
    }

    pub fn reject(&mut self) {
        self.status = ConnectorStatus::Rejected;
    }

    pub fn is_approved(&self) -> bool {
        self.status == ConnectorStatus::Approved
    }
}
