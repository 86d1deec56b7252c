//! Query validation.
//!
//! Tenant-controlled identifiers (tables, columns, aliases, sort fields) cannot
//! be bound as parameters, so they pass an allow-list check before they are
//! embedded in SQL:
//!
//! - format: `^[A-Za-z_][A-Za-z0-9_]*$`
//! - length: at most [`MAX_IDENTIFIER_LENGTH`] characters
//! - not a member of the reserved keyword blocklist (case-insensitive)
//!
//! Free-form text (filter values, join conditions, raw SQL) is scanned for
//! injection signatures instead. Values are still bound by the builder; the
//! scan rejects payloads early and bounds what reaches the database.
//!
//! # Example
//!
//! ```rust
//! use dataport::validation::{IdentifierKind, QueryValidator};
//!
//! assert!(QueryValidator::validate_identifier("user_accounts", IdentifierKind::Table).is_ok());
//! assert!(QueryValidator::validate_identifier("SELECT", IdentifierKind::Table).is_err());
//! assert!(QueryValidator::contains_injection_pattern("' OR '1'='1"));
//! ```

mod error;

pub use error::{IdentifierKind, ValidationError, ValidationResult};

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum identifier length in characters.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Maximum free-form input length in characters.
pub const MAX_INPUT_LENGTH: usize = 10_000;

/// Words that may never be used as identifiers.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "DROP",
    "CREATE",
    "ALTER",
    "UNION",
    "OR",
    "AND",
    "WHERE",
    "FROM",
    "JOIN",
    "EXEC",
    "EXECUTE",
    "SCRIPT",
    "JAVASCRIPT",
    "ONCLICK",
    "ONERROR",
    "CAST",
    "CONVERT",
    "DECLARE",
    "SHUTDOWN",
    "GRANT",
    "REVOKE",
];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // comment markers
        r"--|/\*|\*/|#",
        // ' OR '1'='1, AND 1=1
        r#"(?i)(\bOR\b|\bAND\b)\s+['"]?\w+['"]?\s*=\s*['"]?\w+['"]?"#,
        r"(?is)\bUNION\b.*\bSELECT\b",
        // stacked statements
        r"(?i);\s*(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE)",
        // stored procedures; a bare `xp_`/`sp_` token, not every `sp_` prefix
        r"(?i)\b(EXEC|EXECUTE|xp_|sp_)\b",
        // XSS
        r"(?i)<script|javascript:|onerror=|onclick=",
        // time-based blind injection
        r"(?i)\b(SLEEP|WAITFOR|DELAY)\b\s*\(|\bWAITFOR\s+DELAY\b",
        r"(?i)\bDROP\b\s+(TABLE|DATABASE|SCHEMA)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("injection pattern"))
    .collect()
});

/// Stateless validator for identifiers and user input.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryValidator;

impl QueryValidator {
    /// Validate an identifier before it is embedded in SQL.
    ///
    /// Checks run in order: empty, length, format, keyword. The value is not
    /// trimmed, so surrounding whitespace is a format violation.
    pub fn validate_identifier(name: &str, kind: IdentifierKind) -> ValidationResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::Empty { kind });
        }
        if name.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(ValidationError::IdentifierTooLong { kind });
        }
        if !IDENTIFIER.is_match(name) {
            return Err(ValidationError::InvalidIdentifier {
                kind,
                value: name.to_string(),
            });
        }
        if Self::is_reserved_keyword(name) {
            return Err(ValidationError::ReservedKeyword {
                kind,
                value: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_table_name(name: &str) -> ValidationResult<()> {
        Self::validate_identifier(name, IdentifierKind::Table)
    }

    pub fn validate_column_name(name: &str) -> ValidationResult<()> {
        Self::validate_identifier(name, IdentifierKind::Column)
    }

    pub fn validate_schema_name(name: &str) -> ValidationResult<()> {
        Self::validate_identifier(name, IdentifierKind::Schema)
    }

    pub fn is_reserved_keyword(name: &str) -> bool {
        RESERVED_KEYWORDS
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(name))
    }

    /// True if `input` matches any injection signature.
    pub fn contains_injection_pattern(input: &str) -> bool {
        INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(input))
    }

    /// Reject oversized input, then scan it for injection signatures.
    ///
    /// The length cap is checked first so the patterns never run over
    /// unbounded payloads.
    pub fn validate_user_input(input: &str, field: &str) -> ValidationResult<()> {
        if input.chars().count() > MAX_INPUT_LENGTH {
            return Err(ValidationError::InputTooLong {
                field: field.to_string(),
            });
        }
        if Self::contains_injection_pattern(input) {
            return Err(ValidationError::InjectionDetected {
                field: field.to_string(),
            });
        }
        Ok(())
    }

    /// [`validate_user_input`](Self::validate_user_input) for optional values.
    /// `None` is accepted.
    pub fn validate_optional_input(input: Option<&str>, field: &str) -> ValidationResult<()> {
        match input {
            Some(input) => Self::validate_user_input(input, field),
            None => Ok(()),
        }
    }

    /// Strip NUL bytes and surrounding whitespace.
    ///
    /// Quotes are left alone; values are bound, never spliced.
    pub fn sanitize_value(value: &str) -> String {
        value.replace('\0', "").trim().to_string()
    }

    pub fn validate_table_in_whitelist(
        table: &str,
        allowed: &HashSet<String>,
    ) -> ValidationResult<()> {
        Self::validate_table_name(table)?;
        if !allowed.contains(table) {
            return Err(ValidationError::TableNotRegistered(table.to_string()));
        }
        Ok(())
    }

    pub fn validate_column_in_whitelist(
        column: &str,
        allowed: &HashSet<String>,
    ) -> ValidationResult<()> {
        Self::validate_column_name(column)?;
        if !allowed.contains(column) {
            return Err(ValidationError::ColumnNotAvailable(column.to_string()));
        }
        Ok(())
    }

    /// Validate a `column [ASC|DESC]` clause against allowed columns.
    /// A blank clause is accepted.
    pub fn validate_order_by(clause: &str, allowed: &HashSet<String>) -> ValidationResult<()> {
        let parts: Vec<&str> = clause.split_whitespace().collect();
        match parts.as_slice() {
            [] => Ok(()),
            [column] => Self::validate_column_in_whitelist(column, allowed),
            [column, direction] => {
                Self::validate_column_in_whitelist(column, allowed)?;
                Self::validate_sort_direction(direction).map(|_| ())
            }
            _ => Err(ValidationError::InvalidOrderBy(clause.to_string())),
        }
    }

    /// Normalize a sort direction to `ASC` or `DESC`.
    pub fn validate_sort_direction(direction: &str) -> ValidationResult<&'static str> {
        match direction.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok("ASC"),
            "DESC" => Ok("DESC"),
            _ => Err(ValidationError::InvalidSortDirection(direction.to_string())),
        }
    }
}
