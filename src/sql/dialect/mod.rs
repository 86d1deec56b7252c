//! SQL dialect definitions.
//!
//! A dialect is selected once per connector from its driver and covers the
//! few places where generated SQL differs between backends:
//!
//! - default schema when the connector does not name one
//! - native placeholder syntax for bound parameters
//! - masking expressions that can be compiled into the select list
//! - the sqlparser dialect used to check raw SQL
//!
//! # Usage
//!
//! ```rust
//! use dataport::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! assert_eq!(dialect.default_schema(), "public");
//! assert_eq!(dialect.placeholder(2, "p2"), "$2");
//! ```

pub mod helpers;
mod postgres;
mod sqlite;

pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::model::FieldDefinition;

/// SQL dialect trait - the per-backend rendering rules.
pub trait SqlDialect: std::fmt::Debug + Send + Sync {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Schema used when the connector config has no `schema` key.
    fn default_schema(&self) -> &'static str;

    /// Quote an identifier.
    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Native placeholder for the `index`-th (1-based) distinct parameter.
    fn placeholder(&self, index: usize, name: &str) -> String;

    /// Select-list expression masking `field`, aliased to its output name.
    ///
    /// `None` means the mask cannot be expressed in this dialect and must be
    /// applied to fetched values instead.
    fn masked_projection(&self, field: &FieldDefinition) -> Option<String>;

    /// Parser dialect for read-only checks.
    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect>;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn default_schema(&self) -> &'static str {
        self.dialect().default_schema()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn placeholder(&self, index: usize, name: &str) -> String {
        self.dialect().placeholder(index, name)
    }

    fn masked_projection(&self, field: &FieldDefinition) -> Option<String> {
        self.dialect().masked_projection(field)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        self.dialect().parser_dialect()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
