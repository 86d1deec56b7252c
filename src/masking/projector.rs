//! Row projection onto an endpoint's field definitions.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use super::MaskingService;
use crate::model::{FieldDefinition, Row};

/// Reduces fetched rows to an endpoint's defined fields.
///
/// Each output row holds only the defined fields, in definition order, keyed
/// by output name (alias else source name), with masking applied. Columns
/// missing from the fetched row are omitted. With no definitions, rows pass
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct FieldProjector {
    fields: Arc<Vec<FieldDefinition>>,
    /// Output names already projected and masked by the generated SQL.
    masked_in_sql: HashSet<String>,
    /// The generated SQL already renamed columns to output names.
    projected_in_sql: bool,
}

impl FieldProjector {
    pub fn new(fields: Arc<Vec<FieldDefinition>>) -> Self {
        Self {
            fields,
            masked_in_sql: HashSet::new(),
            projected_in_sql: false,
        }
    }

    /// Projector for SQL that already selects `output_name` for every field
    /// and masks the fields in `masked_in_sql`.
    pub fn projected_in_sql(
        fields: Arc<Vec<FieldDefinition>>,
        masked_in_sql: HashSet<String>,
    ) -> Self {
        Self {
            fields,
            masked_in_sql,
            projected_in_sql: true,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn project(&self, masking: &MaskingService, row: Row) -> Row {
        if self.is_passthrough() {
            return row;
        }

        let mut projected = Row::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            let output = field.output_name();
            let source = if self.projected_in_sql {
                output
            } else {
                field.name.as_str()
            };
            let Some(value) = lookup(&row, source) else {
                continue;
            };

            let value = if field.has_masking() && !self.masked_in_sql.contains(output) {
                masking.apply_value(value, &field.masking)
            } else {
                value.clone()
            };
            projected.insert(output.to_string(), value);
        }
        projected
    }

    pub fn project_all(&self, masking: &MaskingService, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter().map(|row| self.project(masking, row)).collect()
    }
}

/// Exact match first, then ASCII case-insensitive (Postgres folds unquoted
/// names to lower case).
fn lookup<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}
