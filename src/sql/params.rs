//! Bound parameters and named-placeholder rewriting.
//!
//! The builder emits named placeholders (`:p1`, `:limit`, ...). Before
//! execution, [`bind_named`] rewrites them to the dialect's native form and
//! orders the values to match. Placeholders inside string literals or quoted
//! identifiers are left alone, as are `::` casts.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::dialect::SqlDialect;

/// Placeholder name for the page size.
pub const LIMIT_PARAM: &str = "limit";

/// Placeholder name for the row offset.
pub const OFFSET_PARAM: &str = "offset";

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoundParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl BoundParam {
    /// Textual form sent to drivers that coerce from text.
    /// `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        match self {
            BoundParam::Null => None,
            BoundParam::Bool(b) => Some(b.to_string()),
            BoundParam::Int(i) => Some(i.to_string()),
            BoundParam::Float(f) => Some(f.to_string()),
            BoundParam::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for BoundParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for BoundParam {
    fn from(s: &str) -> Self {
        BoundParam::Text(s.to_string())
    }
}

impl From<String> for BoundParam {
    fn from(s: String) -> Self {
        BoundParam::Text(s)
    }
}

impl From<i64> for BoundParam {
    fn from(i: i64) -> Self {
        BoundParam::Int(i)
    }
}

impl From<u64> for BoundParam {
    fn from(u: u64) -> Self {
        i64::try_from(u)
            .map(BoundParam::Int)
            .unwrap_or_else(|_| BoundParam::Text(u.to_string()))
    }
}

/// A named parameter as produced by the builder.
pub type NamedParam = (String, BoundParam);

/// SQL in the dialect's native placeholder form, with values in placeholder
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeStatement {
    pub sql: String,
    pub params: Vec<NamedParam>,
}

/// Rewrite named placeholders that have a bound value.
///
/// Each distinct name is numbered by first appearance. Names without a value
/// are left untouched.
pub fn bind_named(sql: &str, params: &[NamedParam], dialect: &dyn SqlDialect) -> NativeStatement {
    let values: HashMap<&str, &BoundParam> =
        params.iter().map(|(name, value)| (name.as_str(), value)).collect();

    let mut out = String::with_capacity(sql.len());
    let mut ordered: Vec<NamedParam> = Vec::new();
    let mut assigned: HashMap<String, usize> = HashMap::new();

    let chars: Vec<char> = sql.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if is_ident_start(chars.get(i + 1)) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();

                match values.get(name.as_str()) {
                    Some(value) => {
                        let index = match assigned.get(&name) {
                            Some(index) => *index,
                            None => {
                                ordered.push((name.clone(), (*value).clone()));
                                assigned.insert(name.clone(), ordered.len());
                                ordered.len()
                            }
                        };
                        out.push_str(&dialect.placeholder(index, &name));
                    }
                    None => {
                        out.push(':');
                        out.push_str(&name);
                    }
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    NativeStatement {
        sql: out,
        params: ordered,
    }
}

fn is_ident_start(c: Option<&char>) -> bool {
    matches!(c, Some(c) if c.is_ascii_alphabetic() || *c == '_')
}
