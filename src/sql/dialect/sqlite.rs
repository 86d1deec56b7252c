//! SQLite SQL dialect.
//!
//! SQLite has no built-in regex replacement, so only FIXED masks are
//! compiled into SQL. Named placeholders (`:name`) are native.

use sqlparser::dialect::SQLiteDialect;

use super::helpers;
use super::SqlDialect;
use crate::masking::DEFAULT_MASK;
use crate::model::{FieldDefinition, MaskingType};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn default_schema(&self) -> &'static str {
        "main"
    }

    fn placeholder(&self, index: usize, name: &str) -> String {
        helpers::placeholder_named(index, name)
    }

    fn masked_projection(&self, field: &FieldDefinition) -> Option<String> {
        let masking = &field.masking;
        match masking.kind {
            MaskingType::Fixed if masking.enabled => Some(helpers::fixed_mask(
                &field.name,
                masking.replacement.as_deref().unwrap_or(DEFAULT_MASK),
                field.output_name(),
            )),
            _ => None,
        }
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(SQLiteDialect {})
    }
}
