//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used here:
//! - ANSI identifier quoting (`"`)
//! - Positional placeholders (`$1`, `$2`, ...)
//! - `REGEXP_REPLACE(source, pattern, replacement, 'g')` for regex masks

use sqlparser::dialect::PostgreSqlDialect;

use super::helpers;
use super::SqlDialect;
use crate::masking::DEFAULT_MASK;
use crate::model::{FieldDefinition, MaskingType};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    fn placeholder(&self, index: usize, name: &str) -> String {
        helpers::placeholder_positional(index, name)
    }

    fn masked_projection(&self, field: &FieldDefinition) -> Option<String> {
        let masking = &field.masking;
        if !masking.enabled {
            return None;
        }
        let alias = field.output_name();

        match masking.kind {
            MaskingType::Fixed => Some(helpers::fixed_mask(
                &field.name,
                masking.replacement.as_deref().unwrap_or(DEFAULT_MASK),
                alias,
            )),
            MaskingType::Regex => {
                let pattern = masking.pattern.as_deref()?;
                let replacement = masking.replacement.as_deref()?;
                // Group references differ between the two regex engines.
                if replacement.contains('$') || replacement.contains('\\') {
                    return None;
                }
                Some(helpers::regexp_replace_global(
                    &field.name,
                    pattern,
                    replacement,
                    alias,
                ))
            }
            MaskingType::Partial => None,
        }
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(PostgreSqlDialect {})
    }
}
