//! Field masking.
//!
//! [`MaskingService`] rewrites single values per a [`MaskingConfig`]:
//!
//! | Type | Behaviour |
//! |------|-----------|
//! | FIXED | replacement, or `*****` |
//! | REGEX | replace every match of `pattern` with `replacement` |
//! | PARTIAL | `ShowFirstN`, `ShowLastN`, email heuristic, or the pattern itself |
//!
//! Masking is pure. Anything that cannot be interpreted masks to `*****`
//! rather than leaking the original value. [`FieldProjector`] applies the
//! service to whole rows.
//!
//! # Example
//!
//! ```rust
//! use dataport::masking::MaskingService;
//! use dataport::model::MaskingConfig;
//!
//! let masking = MaskingService::new();
//! let masked = masking.apply("123456789", &MaskingConfig::partial("ShowFirst3"));
//! assert_eq!(masked, "123******");
//! ```

mod projector;

pub use projector::FieldProjector;

use std::borrow::Cow;

use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;

use crate::model::{MaskingConfig, MaskingType};

/// Replacement used when no other value can be produced safely.
pub const DEFAULT_MASK: &str = "*****";

const EMAIL_LOCAL_MASK: &str = "****";
const SHOW_FIRST: &str = "ShowFirst";
const SHOW_LAST: &str = "ShowLast";

/// Applies masking policies to values.
///
/// Compiled REGEX patterns are memoized; invalid patterns are remembered as
/// invalid so they are reported once.
#[derive(Debug, Default)]
pub struct MaskingService {
    patterns: DashMap<String, Option<Regex>>,
}

impl MaskingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask a string value.
    pub fn apply(&self, value: &str, config: &MaskingConfig) -> String {
        if !config.enabled {
            return value.to_string();
        }

        match config.kind {
            MaskingType::Fixed => config
                .replacement
                .clone()
                .unwrap_or_else(|| DEFAULT_MASK.to_string()),
            MaskingType::Regex => self.apply_regex(value, config),
            MaskingType::Partial => apply_partial(value, config.pattern.as_deref()),
        }
    }

    /// Mask a JSON value.
    ///
    /// `null` stays `null`. Other scalars are masked through their string
    /// form; arrays and objects through their JSON text.
    pub fn apply_value(&self, value: &Value, config: &MaskingConfig) -> Value {
        if !config.enabled {
            return value.clone();
        }
        let text: Cow<'_, str> = match value {
            Value::Null => return Value::Null,
            Value::String(s) => Cow::Borrowed(s),
            other => Cow::Owned(other.to_string()),
        };
        Value::String(self.apply(&text, config))
    }

    fn apply_regex(&self, value: &str, config: &MaskingConfig) -> String {
        let (Some(pattern), Some(replacement)) = (&config.pattern, &config.replacement) else {
            return value.to_string();
        };

        let Some(regex) = self.compiled(pattern) else {
            return DEFAULT_MASK.to_string();
        };
        match replacement_template(&regex, replacement) {
            Some(template) => regex.replace_all(value, template.as_str()).into_owned(),
            None => {
                tracing::warn!(replacement = %replacement, "invalid group reference in masking replacement");
                DEFAULT_MASK.to_string()
            }
        }
    }

    fn compiled(&self, pattern: &str) -> Option<Regex> {
        if let Some(entry) = self.patterns.get(pattern) {
            return entry.clone();
        }

        let compiled = match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "invalid masking regex, masking fully");
                None
            }
        };
        self.patterns
            .entry(pattern.to_string())
            .or_insert(compiled)
            .clone()
    }
}

/// Translate a stored replacement into a `regex` template.
///
/// Stored replacements follow `$N` / `${name}` group syntax with `\` escaping
/// the next character. Digits after `$N` extend the group number only while
/// it stays a valid group, so `$1XXXX` is group 1 then `XXXX`. Literal `$` is
/// doubled. Returns `None` for references to missing groups, a `$` not
/// followed by a group, or a trailing `\`.
fn replacement_template(regex: &Regex, replacement: &str) -> Option<String> {
    let group_count = regex.captures_len() - 1;
    let mut template = String::with_capacity(replacement.len() + 8);
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                '$' => template.push_str("$$"),
                escaped => template.push(escaped),
            },
            '$' => {
                if chars.next_if_eq(&'{').is_some() {
                    let mut name = String::new();
                    loop {
                        match chars.next()? {
                            '}' => break,
                            c => name.push(c),
                        }
                    }
                    if !regex.capture_names().flatten().any(|n| n == name) {
                        return None;
                    }
                    template.push_str(&format!("${{{}}}", name));
                    continue;
                }

                let mut group = chars.next()?.to_digit(10)? as usize;
                if group > group_count {
                    return None;
                }
                while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                    let extended = group * 10 + digit as usize;
                    if extended > group_count {
                        break;
                    }
                    group = extended;
                    chars.next();
                }
                template.push_str(&format!("${{{}}}", group));
            }
            other => template.push(other),
        }
    }

    Some(template)
}

fn apply_partial(value: &str, pattern: Option<&str>) -> String {
    let Some(pattern) = pattern.filter(|p| !p.trim().is_empty()) else {
        return DEFAULT_MASK.to_string();
    };

    if let Some(count) = pattern.strip_prefix(SHOW_FIRST) {
        show_first(value, count)
    } else if let Some(count) = pattern.strip_prefix(SHOW_LAST) {
        show_last(value, count)
    } else if pattern.contains('@') {
        mask_email(value)
    } else {
        pattern.to_string()
    }
}

fn show_first(value: &str, count: &str) -> String {
    let Ok(count) = count.parse::<usize>() else {
        return DEFAULT_MASK.to_string();
    };
    let len = value.chars().count();
    if len <= count {
        return value.to_string();
    }
    let kept: String = value.chars().take(count).collect();
    format!("{}{}", kept, "*".repeat(len - count))
}

fn show_last(value: &str, count: &str) -> String {
    let Ok(count) = count.parse::<usize>() else {
        return DEFAULT_MASK.to_string();
    };
    let len = value.chars().count();
    if len <= count {
        return value.to_string();
    }
    let kept: String = value.chars().skip(len - count).collect();
    format!("{}{}", "*".repeat(len - count), kept)
}

fn mask_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let mut chars = local.chars();
            let masked_local = match (chars.next(), chars.next_back()) {
                (Some(first), Some(last)) if local.chars().count() > 2 => {
                    format!("{first}{EMAIL_LOCAL_MASK}{last}")
                }
                _ => EMAIL_LOCAL_MASK.to_string(),
            };
            format!("{masked_local}@{domain}")
        }
        _ => DEFAULT_MASK.to_string(),
    }
}
