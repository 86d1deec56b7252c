//! Shared helper functions for SQL dialect implementations.

// =============================================================================
// Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes (standard SQL).
/// Used by: all dialects
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Placeholders
// =============================================================================

/// `$1`, `$2`, ... (1-based).
/// Used by: Postgres
pub fn placeholder_positional(index: usize, _name: &str) -> String {
    format!("${}", index)
}

/// `:name`.
/// Used by: SQLite
pub fn placeholder_named(_index: usize, name: &str) -> String {
    format!(":{}", name)
}

// =============================================================================
// Masking projections
// =============================================================================

/// `CASE WHEN <column> IS NULL THEN NULL ELSE '<replacement>' END AS <alias>`
///
/// NULL stays NULL, as it does when masking after fetch.
pub fn fixed_mask(column: &str, replacement: &str, alias: &str) -> String {
    format!(
        "CASE WHEN {} IS NULL THEN NULL ELSE {} END AS {}",
        column,
        quote_string_single(replacement),
        quote_double(alias)
    )
}

/// `REGEXP_REPLACE(<column>, '<pattern>', '<replacement>', 'g') AS <alias>`
pub fn regexp_replace_global(column: &str, pattern: &str, replacement: &str, alias: &str) -> String {
    format!(
        "REGEXP_REPLACE({}, {}, {}, 'g') AS {}",
        column,
        quote_string_single(pattern),
        quote_string_single(replacement),
        quote_double(alias)
    )
}
