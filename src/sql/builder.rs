//! SQL builder.
//!
//! Compiles a [`QueryDescription`] into one SELECT statement. Builder-mode
//! clauses are emitted in a fixed order:
//!
//! ```text
//! SELECT <columns> FROM <schema.table> [<type> JOIN ...] [WHERE ...] [ORDER BY ...] [LIMIT ...]
//! ```
//!
//! Every tenant-supplied identifier is validated once, at the point where it
//! is embedded. Filter values never reach the SQL text; they are returned as
//! named parameters (`:p1`, `:p2`, ...).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::dialect::{Dialect, SqlDialect};
use super::guard::validate_read_only;
use super::params::{BoundParam, NamedParam, LIMIT_PARAM, OFFSET_PARAM};
use crate::model::{
    ColumnSpec, ConnectorConfig, FieldDefinition, FilterSpec, JoinSpec, QueryDescription,
    QueryMode, SortSpec,
};
use crate::validation::{IdentifierKind, QueryValidator, ValidationError, ValidationResult};

/// Page size appended to raw test SQL that has no LIMIT and no explicit limit.
pub const DEFAULT_TEST_LIMIT: u64 = 10;

static LIMIT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("limit pattern"));

/// How the statement is paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// End in `LIMIT :limit OFFSET :offset`, bound by the caller.
    Placeholders,
    /// Append a literal `LIMIT n` (test queries).
    Literal,
}

/// A compiled statement with its named parameters.
///
/// Pagination placeholders are not included in `params`; see
/// [`BuiltQuery::bind_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<NamedParam>,
}

impl BuiltQuery {
    /// Bind `:limit` and `:offset`.
    pub fn bind_page(mut self, limit: u64, offset: u64) -> Self {
        self.params
            .push((LIMIT_PARAM.to_string(), BoundParam::from(limit)));
        self.params
            .push((OFFSET_PARAM.to_string(), BoundParam::from(offset)));
        self
    }
}

/// A statement whose select list is the endpoint's field projection.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedQuery {
    pub query: BuiltQuery,
    /// Output names masked by the SQL itself.
    pub masked: HashSet<String>,
}

/// Builds SQL for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlBuilder {
    dialect: Dialect,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compile `query` against `schema`.
    pub fn build_sql(
        &self,
        query: &QueryDescription,
        pagination: Pagination,
        schema: &str,
    ) -> ValidationResult<BuiltQuery> {
        let built = match query.mode {
            QueryMode::RawSql => self.build_raw(query, pagination)?,
            QueryMode::Builder => self.build_structured(query, pagination, schema)?,
        };
        tracing::debug!(dialect = %self.dialect, sql = %built.sql, "built query");
        Ok(built)
    }

    /// Compile `query` and project it onto `fields`, masking in SQL where the
    /// dialect can.
    ///
    /// The outer select names every field by its output name, so fetched rows
    /// are keyed the way they are returned.
    pub fn build_masked(
        &self,
        query: &QueryDescription,
        fields: &[FieldDefinition],
        pagination: Pagination,
        schema: &str,
    ) -> ValidationResult<MaskedQuery> {
        let inner = self.build_sql(query, pagination, schema)?;
        if fields.is_empty() {
            return Ok(MaskedQuery {
                query: inner,
                masked: HashSet::new(),
            });
        }

        let mut masked = HashSet::new();
        let mut items = Vec::with_capacity(fields.len());
        for field in fields.iter() {
            QueryValidator::validate_column_name(&field.name)?;
            let output = field.output_name();
            QueryValidator::validate_identifier(output, IdentifierKind::Alias)?;

            match self.dialect.masked_projection(field) {
                Some(expr) => {
                    masked.insert(output.to_string());
                    items.push(expr);
                }
                None => items.push(format!(
                    "{} AS {}",
                    field.name,
                    self.dialect.quote_identifier(output)
                )),
            }
        }

        Ok(MaskedQuery {
            query: BuiltQuery {
                sql: format!(
                    "SELECT {} FROM ({}) AS masked_source",
                    items.join(", "),
                    inner.sql
                ),
                params: inner.params,
            },
            masked,
        })
    }

    fn build_raw(
        &self,
        query: &QueryDescription,
        pagination: Pagination,
    ) -> ValidationResult<BuiltQuery> {
        let sql = query
            .sql
            .as_deref()
            .map(str::trim)
            .map(|sql| sql.trim_end_matches(';').trim_end())
            .filter(|sql| !sql.is_empty())
            .ok_or(ValidationError::Missing("SQL query"))?;

        QueryValidator::validate_user_input(sql, "Custom SQL query")?;
        validate_read_only(sql, &self.dialect)?;

        let sql = match pagination {
            Pagination::Placeholders => format!(
                "SELECT * FROM ({}) AS subquery LIMIT :{} OFFSET :{}",
                sql, LIMIT_PARAM, OFFSET_PARAM
            ),
            Pagination::Literal if LIMIT_KEYWORD.is_match(sql) => sql.to_string(),
            Pagination::Literal => format!(
                "{} LIMIT {}",
                sql,
                query.limit.unwrap_or(DEFAULT_TEST_LIMIT)
            ),
        };

        Ok(BuiltQuery {
            sql,
            params: Vec::new(),
        })
    }

    fn build_structured(
        &self,
        query: &QueryDescription,
        pagination: Pagination,
        schema: &str,
    ) -> ValidationResult<BuiltQuery> {
        let root = query
            .root_table
            .as_deref()
            .ok_or(ValidationError::Missing("Root table"))?;
        validate_table_reference(root)?;

        let mut params = Vec::new();
        let mut sql = String::from("SELECT ");
        sql.push_str(&build_column_list(&query.columns, schema)?);
        sql.push_str(" FROM ");
        sql.push_str(&Self::qualify_table_name(root, schema));

        for join in &query.joins {
            sql.push_str(&build_join(join, schema)?);
        }

        if !query.filters.is_empty() {
            let conditions = query
                .filters
                .iter()
                .map(|filter| build_filter(filter, &mut params))
                .collect::<ValidationResult<Vec<_>>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !query.sort.is_empty() {
            let order = query
                .sort
                .iter()
                .map(build_sort)
                .collect::<ValidationResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (pagination, query.limit) {
            (Pagination::Placeholders, _) => {
                sql.push_str(&format!(" LIMIT :{} OFFSET :{}", LIMIT_PARAM, OFFSET_PARAM));
            }
            (Pagination::Literal, Some(limit)) => sql.push_str(&format!(" LIMIT {}", limit)),
            (Pagination::Literal, None) => {}
        }

        Ok(BuiltQuery { sql, params })
    }

    /// Prefix a bare table name with `schema`. Names that already contain a
    /// `.` are returned as-is.
    pub fn qualify_table_name(table: &str, schema: &str) -> String {
        if table.contains('.') || schema.is_empty() {
            table.to_string()
        } else {
            format!("{}.{}", schema, table)
        }
    }

    /// Schema from the connector's `schema` key, else the dialect default.
    pub fn resolve_schema(config: &ConnectorConfig, dialect: Dialect) -> ValidationResult<String> {
        match config.get_str("schema").map(|s| s.trim().to_string()) {
            Some(schema) if !schema.is_empty() => {
                QueryValidator::validate_schema_name(&schema)?;
                Ok(schema)
            }
            _ => Ok(dialect.default_schema().to_string()),
        }
    }
}

/// A table name, optionally schema-qualified (`schema.table`).
fn validate_table_reference(table: &str) -> ValidationResult<()> {
    match table.split('.').collect::<Vec<_>>().as_slice() {
        [name] => QueryValidator::validate_table_name(name),
        [schema, name] => {
            QueryValidator::validate_schema_name(schema)?;
            QueryValidator::validate_table_name(name)
        }
        _ => Err(ValidationError::InvalidIdentifier {
            kind: IdentifierKind::Table,
            value: table.to_string(),
        }),
    }
}

fn build_column_list(columns: &[ColumnSpec], schema: &str) -> ValidationResult<String> {
    if columns.is_empty() {
        return Ok("*".to_string());
    }

    let rendered = columns
        .iter()
        .map(|column| {
            QueryValidator::validate_column_name(&column.name)?;
            let mut item = match column.table.as_deref() {
                Some(table) => {
                    validate_table_reference(table)?;
                    format!(
                        "{}.{}",
                        SqlBuilder::qualify_table_name(table, schema),
                        column.name
                    )
                }
                None => column.name.clone(),
            };
            if let Some(alias) = column.alias.as_deref() {
                QueryValidator::validate_identifier(alias, IdentifierKind::Alias)?;
                item.push_str(" AS ");
                item.push_str(alias);
            }
            Ok(item)
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(rendered.join(", "))
}

fn build_join(join: &JoinSpec, schema: &str) -> ValidationResult<String> {
    validate_table_reference(&join.table)?;

    let join_type = join.join_type.trim().to_ascii_uppercase();
    let table = SqlBuilder::qualify_table_name(&join.table, schema);
    match join_type.as_str() {
        "CROSS" => Ok(format!(" CROSS JOIN {}", table)),
        "INNER" | "LEFT" | "RIGHT" | "FULL" => {
            let on = join.on.trim();
            if on.is_empty() {
                return Err(ValidationError::Missing("Join condition"));
            }
            QueryValidator::validate_user_input(on, "Join condition")?;
            Ok(format!(" {} JOIN {} ON {}", join_type, table, on))
        }
        _ => Err(ValidationError::InvalidJoinType(join.join_type.clone())),
    }
}

fn build_filter(filter: &FilterSpec, params: &mut Vec<NamedParam>) -> ValidationResult<String> {
    QueryValidator::validate_identifier(&filter.field, IdentifierKind::FilterField)?;

    let op = match filter.operator.trim().to_ascii_uppercase().as_str() {
        "EQ" => "=",
        "NEQ" => "!=",
        "GT" => ">",
        "LT" => "<",
        "GTE" => ">=",
        "LTE" => "<=",
        "LIKE" => "LIKE",
        "IN" => return build_in_filter(filter, params),
        _ => return Err(ValidationError::UnsupportedOperator(filter.operator.clone())),
    };

    let value = filter_value(&filter.field, &filter.value, "Filter value")?;
    let placeholder = push_param(params, value);
    Ok(format!("{} {} {}", filter.field, op, placeholder))
}

fn build_in_filter(filter: &FilterSpec, params: &mut Vec<NamedParam>) -> ValidationResult<String> {
    let values = match &filter.value {
        Value::String(list) => {
            let list = QueryValidator::sanitize_value(list);
            QueryValidator::validate_user_input(&list, "IN clause values")?;
            list.split(',')
                .map(|item| item.trim().trim_matches('\'').trim())
                .filter(|item| !item.is_empty())
                .map(BoundParam::from)
                .collect::<Vec<_>>()
        }
        Value::Array(items) => items
            .iter()
            .map(|item| filter_value(&filter.field, item, "IN clause values"))
            .collect::<ValidationResult<Vec<_>>>()?,
        Value::Null => Vec::new(),
        other => vec![filter_value(&filter.field, other, "IN clause values")?],
    };

    if values.is_empty() {
        return Err(ValidationError::EmptyInList {
            field: filter.field.clone(),
        });
    }

    let placeholders: Vec<String> = values
        .into_iter()
        .map(|value| push_param(params, value))
        .collect();
    Ok(format!("{} IN ({})", filter.field, placeholders.join(", ")))
}

/// Type a scalar filter value. Strings are sanitized and scanned; `null`
/// binds as an empty string.
fn filter_value(field: &str, value: &Value, label: &str) -> ValidationResult<BoundParam> {
    match value {
        Value::Null => Ok(BoundParam::Text(String::new())),
        Value::Bool(b) => Ok(BoundParam::Bool(*b)),
        Value::Number(n) => Ok(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => BoundParam::Int(i),
            (None, Some(f)) => BoundParam::Float(f),
            (None, None) => BoundParam::Text(n.to_string()),
        }),
        Value::String(s) => {
            let sanitized = QueryValidator::sanitize_value(s);
            QueryValidator::validate_user_input(&sanitized, label)?;
            Ok(BoundParam::Text(sanitized))
        }
        Value::Array(_) | Value::Object(_) => Err(ValidationError::UnsupportedFilterValue {
            field: field.to_string(),
            reason: "expected a scalar".to_string(),
        }),
    }
}

fn push_param(params: &mut Vec<NamedParam>, value: BoundParam) -> String {
    let name = format!("p{}", params.len() + 1);
    let placeholder = format!(":{}", name);
    params.push((name, value));
    placeholder
}

fn build_sort(sort: &SortSpec) -> ValidationResult<String> {
    QueryValidator::validate_identifier(&sort.field, IdentifierKind::SortField)?;
    let direction = match sort.direction.as_deref() {
        Some(direction) => QueryValidator::validate_sort_direction(direction)?,
        None => "ASC",
    };
    Ok(format!("{} {}", sort.field, direction))
}
