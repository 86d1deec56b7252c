//! Declarative query descriptions.
//!
//! A [`QueryDescription`] is either builder-mode (root table, joins, columns,
//! filters, sort, limit) or raw-SQL mode (`sql`). Only the active mode's
//! fields are read; the other set is ignored.
//!
//! Join types, filter operators and sort directions are kept as the strings
//! the tenant supplied. The SQL builder parses them at the point of embedding
//! so that a bad token is reported as a validation error naming the value.
//!
//! # Example
//!
//! ```rust
//! use dataport::model::{FilterSpec, QueryDescription, SortSpec};
//!
//! let query = QueryDescription::builder("users")
//!     .filter(FilterSpec::new("status", "EQ", "active"))
//!     .sort(SortSpec::desc("created_at"))
//!     .limit(25);
//!
//! assert_eq!(query.root_table.as_deref(), Some("users"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::nullable_vec;

/// Which set of fields is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryMode {
    /// Structured query assembled by the SQL builder.
    #[default]
    #[serde(alias = "builder")]
    Builder,
    /// Tenant-written SELECT, validated and wrapped for pagination.
    #[serde(alias = "SQL", alias = "sql", alias = "raw_sql")]
    RawSql,
}

/// A declarative query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryDescription {
    pub mode: QueryMode,

    // Builder mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_table: Option<String>,
    #[serde(deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinSpec>,
    /// Empty selects every column.
    #[serde(deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnSpec>,
    /// ANDed together.
    #[serde(deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,
    #[serde(deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    // Raw SQL mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Accepted for compatibility; never bound.
    #[serde(deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl QueryDescription {
    /// Start a builder-mode query on `root_table`.
    pub fn builder(root_table: impl Into<String>) -> Self {
        Self {
            mode: QueryMode::Builder,
            root_table: Some(root_table.into()),
            ..Default::default()
        }
    }

    /// A raw-SQL query.
    pub fn raw_sql(sql: impl Into<String>) -> Self {
        Self {
            mode: QueryMode::RawSql,
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_raw_sql(&self) -> bool {
        self.mode == QueryMode::RawSql
    }
}

/// A JOIN against another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// INNER, LEFT, RIGHT, FULL or CROSS (any case).
    #[serde(rename = "type", default = "default_join_type")]
    pub join_type: String,
    pub table: String,
    /// Free-form boolean SQL. Injection-scanned, not parsed.
    #[serde(alias = "onClause", default)]
    pub on: String,
}

fn default_join_type() -> String {
    "INNER".to_string()
}

impl JoinSpec {
    pub fn new(
        join_type: impl Into<String>,
        table: impl Into<String>,
        on: impl Into<String>,
    ) -> Self {
        Self {
            join_type: join_type.into(),
            table: table.into(),
            on: on.into(),
        }
    }
}

/// A selected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ColumnSpec {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// A WHERE condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    /// EQ, NEQ, GT, LT, GTE, LTE, LIKE or IN.
    pub operator: String,
    /// Scalar, or for IN a comma-separated string or array.
    #[serde(default)]
    pub value: Value,
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    /// ASC or DESC; ASC when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(direction.into()),
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, "ASC")
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, "DESC")
    }
}
