//! SQL generation module.
//!
//! - [`builder`] - compiles a query description into one SELECT statement
//! - [`dialect`] - per-backend rendering rules (Postgres, SQLite)
//! - [`params`] - bound parameters and native placeholder rewriting
//! - [`guard`] - read-only check for raw SQL

pub mod builder;
pub mod dialect;
pub mod guard;
pub mod params;

// Re-export commonly used types at the sql module level
pub use builder::{BuiltQuery, MaskedQuery, Pagination, SqlBuilder, DEFAULT_TEST_LIMIT};
pub use dialect::{Dialect, SqlDialect};
pub use guard::validate_read_only;
pub use params::{bind_named, BoundParam, NamedParam, NativeStatement, LIMIT_PARAM, OFFSET_PARAM};
