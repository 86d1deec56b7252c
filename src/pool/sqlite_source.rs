//! SQLite data source over an r2d2 pool.
//!
//! Files are opened read-only. Named placeholders are bound as-is; blobs
//! come back base64-encoded.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{OpenFlags, ToSql};
use serde_json::Value;

use super::{DataSource, SourceError};
use crate::config::{ConnectionConfig, PoolSettings};
use crate::model::Row;
use crate::sql::{bind_named, BoundParam, Dialect, NamedParam};

const MEMORY: &str = ":memory:";

/// Pooled SQLite connections for one connector.
pub struct SqliteSource {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteSource {
    pub fn open(config: &ConnectionConfig, settings: &PoolSettings) -> Result<Self, SourceError> {
        let path = config.sqlite_path();
        let manager = if path == MEMORY {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path).with_flags(
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        };
        let busy_timeout: Duration = settings.statement_timeout();
        let manager = manager.with_init(move |conn| conn.busy_timeout(busy_timeout));

        let max_size = settings.max_size.max(1);
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(settings.min_idle.map(|n| n.min(max_size)))
            .connection_timeout(settings.connection_timeout())
            .idle_timeout(settings.idle_timeout())
            .build(manager)?;

        Ok(Self { pool })
    }
}

impl DataSource for SqliteSource {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&self, sql: &str, params: &[NamedParam]) -> Result<Vec<Row>, SourceError> {
        let statement = bind_named(sql, params, &Dialect::Sqlite);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&statement.sql)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        for (name, value) in &statement.params {
            if let Some(index) = stmt.parameter_index(&format!(":{}", name))? {
                stmt.raw_bind_parameter(index, value)?;
            }
        }

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), decode_value(row.get_ref(index)?));
            }
            out.push(record);
        }
        Ok(out)
    }
}

impl ToSql for BoundParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            BoundParam::Null => ToSqlOutput::Owned(SqlValue::Null),
            BoundParam::Bool(b) => ToSqlOutput::from(*b),
            BoundParam::Int(i) => ToSqlOutput::from(*i),
            BoundParam::Float(f) => ToSqlOutput::from(*f),
            BoundParam::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

fn decode_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}
