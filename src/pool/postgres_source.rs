//! Postgres data source over an r2d2 pool.
//!
//! Parameters are sent in text format so the server coerces them the same
//! way it would coerce a literal. Columns decode to JSON values by type;
//! types without a mapping come back as `null`.

use std::error::Error as StdError;

use bytes::BytesMut;
use postgres::NoTls;
use postgres_types::{to_sql_checked, Format, FromSql, IsNull, ToSql, Type};
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;

use super::{DataSource, SourceError};
use crate::config::{ConnectionConfig, PoolSettings};
use crate::model::Row;
use crate::sql::{bind_named, Dialect, NamedParam};

/// Pooled Postgres connections for one connector.
pub struct PostgresSource {
    pool: Option<Pool<PostgresConnectionManager<NoTls>>>,
}

impl Drop for PostgresSource {
    fn drop(&mut self) {
        // Closing a pool blocks on its connections.
        if let Some(pool) = self.pool.take() {
            let _ = std::thread::spawn(move || drop(pool));
        }
    }
}

impl PostgresSource {
    /// Open a pool. Fails if the first `min_idle` connections cannot be
    /// established within the connection timeout.
    pub fn connect(
        config: &ConnectionConfig,
        settings: &PoolSettings,
    ) -> Result<Self, SourceError> {
        let mut pg_config = config.url.parse::<postgres::Config>()?;
        if let Some(user) = &config.username {
            pg_config.user(user);
        }
        if let Some(password) = &config.password {
            pg_config.password(password);
        }
        pg_config.connect_timeout(settings.connection_timeout());
        pg_config.options(&session_options(settings));

        let max_size = settings.max_size.max(1);
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(settings.min_idle.map(|n| n.min(max_size)))
            .connection_timeout(settings.connection_timeout())
            .idle_timeout(settings.idle_timeout())
            .build(manager)?;

        Ok(Self { pool: Some(pool) })
    }
}

impl DataSource for PostgresSource {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&self, sql: &str, params: &[NamedParam]) -> Result<Vec<Row>, SourceError> {
        let statement = bind_named(sql, params, &Dialect::Postgres);
        let values: Vec<TextParam> = statement
            .params
            .iter()
            .map(|(_, value)| TextParam(value.as_text()))
            .collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        let pool = self.pool.as_ref().ok_or(SourceError::Closed)?;
        let mut conn = pool.get()?;
        let rows = conn.query(statement.sql.as_str(), &refs)?;

        rows.iter().map(decode_row).collect()
    }
}

/// A parameter in text wire format, accepted for any column type.
#[derive(Debug)]
struct TextParam(Option<String>);

impl ToSql for TextParam {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match &self.0 {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// NUMERIC rendered as its exact decimal string.
struct Numeric(String);

impl<'a> FromSql<'a> for Numeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        decode_numeric(raw).map(Numeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary NUMERIC format: ndigits, weight, sign, dscale, then
/// base-10000 digit groups.
fn decode_numeric(raw: &[u8]) -> Result<String, Box<dyn StdError + Sync + Send>> {
    let read = |offset: usize| -> Result<u16, Box<dyn StdError + Sync + Send>> {
        raw.get(offset..offset + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = read(0)? as usize;
    let weight = read(2)? as i16 as i32;
    let sign = read(4)?;
    let dscale = read(6)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let digits = (0..ndigits)
        .map(|i| read(8 + i * 2))
        .collect::<Result<Vec<u16>, _>>()?;
    let group = |index: i32| -> u16 {
        if index < 0 {
            0
        } else {
            digits.get(index as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for index in 1..=weight {
            out.push_str(&format!("{:04}", group(index)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group(index)));
            index += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

fn decode_row(row: &postgres::Row) -> Result<Row, SourceError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_value(row: &postgres::Row, idx: usize, ty: &Type) -> Result<Value, postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|f| Value::from(f64::from(f))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::NUMERIC => row
            .try_get::<_, Option<Numeric>>(idx)?
            .map(|n| Value::String(n.0)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::String)
        }
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)?
            .map(|u| Value::String(u.to_string())),
        Type::DATE => row
            .try_get::<_, Option<time::Date>>(idx)?
            .map(|d| Value::String(d.to_string())),
        Type::TIME => row
            .try_get::<_, Option<time::Time>>(idx)?
            .map(|t| Value::String(format_time(t))),
        Type::TIMESTAMP => row
            .try_get::<_, Option<time::PrimitiveDateTime>>(idx)?
            .map(|t| Value::String(format!("{}T{}", t.date(), format_time(t.time())))),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<time::OffsetDateTime>>(idx)?
            .and_then(|t| t.format(&Rfc3339).ok())
            .map(Value::String),
        _ => {
            tracing::debug!(
                column = row.columns()[idx].name(),
                column_type = %ty,
                "no JSON mapping for column type, returning null"
            );
            None
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// `HH:MM:SS`, with microseconds when present.
fn format_time(t: time::Time) -> String {
    let mut out = format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    if t.microsecond() != 0 {
        out.push_str(&format!(".{:06}", t.microsecond()));
    }
    out
}

/// Server-side session settings for every pooled connection. Sessions are
/// read-only so a write that slips past the query guard still fails.
fn session_options(settings: &PoolSettings) -> String {
    format!(
        "-c statement_timeout={} -c default_transaction_read_only=on",
        settings.statement_timeout_ms
    )
}
