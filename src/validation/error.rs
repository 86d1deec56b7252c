//! Validation errors.

use std::fmt;

use super::MAX_IDENTIFIER_LENGTH;

/// What an identifier names. Used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Schema,
    Alias,
    FilterField,
    SortField,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdentifierKind::Table => "Table name",
            IdentifierKind::Column => "Column name",
            IdentifierKind::Schema => "Schema name",
            IdentifierKind::Alias => "Alias",
            IdentifierKind::FilterField => "Filter field",
            IdentifierKind::SortField => "Sort field",
        })
    }
}

/// A rejected query component. Always a client fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} cannot be null or empty")]
    Empty { kind: IdentifierKind },

    #[error(
        "Invalid {kind}: '{value}'. Only alphanumeric characters and underscores are allowed."
    )]
    InvalidIdentifier { kind: IdentifierKind, value: String },

    #[error("Invalid {kind}: '{value}' is a reserved SQL keyword")]
    ReservedKeyword { kind: IdentifierKind, value: String },

    #[error("{kind} is too long (max {MAX_IDENTIFIER_LENGTH} characters)")]
    IdentifierTooLong { kind: IdentifierKind },

    #[error("Potential SQL injection detected in {field}")]
    InjectionDetected { field: String },

    #[error("{field} exceeds maximum length")]
    InputTooLong { field: String },

    #[error("Table '{0}' is not registered for this connector")]
    TableNotRegistered(String),

    #[error("Column '{0}' is not available in the selected table")]
    ColumnNotAvailable(String),

    #[error("Invalid join type: '{0}'. Allowed: INNER, LEFT, RIGHT, FULL, CROSS")]
    InvalidJoinType(String),

    #[error("Unsupported filter operator: '{0}'")]
    UnsupportedOperator(String),

    #[error("Invalid sort direction: '{0}'. Must be ASC or DESC")]
    InvalidSortDirection(String),

    #[error("Invalid ORDER BY clause: '{0}'")]
    InvalidOrderBy(String),

    #[error("Unsupported value for filter '{field}': {reason}")]
    UnsupportedFilterValue { field: String, reason: String },

    #[error("IN filter on '{field}' has no values")]
    EmptyInList { field: String },

    #[error("Only a single read-only SELECT statement is allowed: {0}")]
    NotReadOnly(String),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;
