//! Read-only check for raw SQL.
//!
//! Raw SQL must parse to exactly one query statement. `SELECT ... INTO` and
//! locking clauses (`FOR UPDATE`, `FOR SHARE`) are rejected since both take
//! effect beyond reading. CTEs and set operands are checked too: a
//! data-modifying body (`INSERT`/`UPDATE` under `WITH`) anywhere fails.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::parser::Parser;

use super::dialect::SqlDialect;
use crate::validation::{ValidationError, ValidationResult};

/// Validate that `sql` is a single read-only query in `dialect`.
pub fn validate_read_only(sql: &str, dialect: &dyn SqlDialect) -> ValidationResult<()> {
    let parser_dialect = dialect.parser_dialect();
    let statements = Parser::parse_sql(&*parser_dialect, sql)
        .map_err(|e| ValidationError::NotReadOnly(format!("unparsable SQL: {}", e)))?;

    let [statement] = statements.as_slice() else {
        return Err(ValidationError::NotReadOnly(format!(
            "expected one statement, found {}",
            statements.len()
        )));
    };

    let Statement::Query(query) = statement else {
        return Err(ValidationError::NotReadOnly(
            "statement is not a query".to_string(),
        ));
    };

    check_query(query)
}

/// Walk a query, its CTEs and set operands. Only read-only bodies pass.
fn check_query(query: &Query) -> ValidationResult<()> {
    if !query.locks.is_empty() {
        return Err(ValidationError::NotReadOnly(
            "locking clauses are not allowed".to_string(),
        ));
    }

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }

    check_body(&query.body)
}

fn check_body(body: &SetExpr) -> ValidationResult<()> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => Err(ValidationError::NotReadOnly(
            "SELECT INTO is not allowed".to_string(),
        )),
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_body(left)?;
            check_body(right)
        }
        SetExpr::Insert(_) | SetExpr::Update(_) => Err(ValidationError::NotReadOnly(
            "data-modifying statements are not allowed".to_string(),
        )),
    }
}
