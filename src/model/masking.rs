//! Field definitions and masking policies.

use serde::{Deserialize, Serialize};

/// How a masked value is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaskingType {
    /// Replace the whole value.
    #[default]
    #[serde(alias = "fixed")]
    Fixed,
    /// Regex replace-all.
    #[serde(alias = "regex")]
    Regex,
    /// ShowFirstN / ShowLastN / email heuristics.
    #[serde(alias = "partial")]
    Partial,
}

/// Masking policy for one field.
///
/// When `enabled` is false the value passes through unchanged; otherwise
/// `kind` decides how `pattern` and `replacement` are read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaskingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub kind: MaskingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl MaskingConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn fixed(replacement: Option<&str>) -> Self {
        Self {
            enabled: true,
            kind: MaskingType::Fixed,
            pattern: None,
            replacement: replacement.map(str::to_string),
        }
    }

    pub fn regex(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            enabled: true,
            kind: MaskingType::Regex,
            pattern: Some(pattern.into()),
            replacement: Some(replacement.into()),
        }
    }

    pub fn partial(pattern: impl Into<String>) -> Self {
        Self {
            enabled: true,
            kind: MaskingType::Partial,
            pattern: Some(pattern.into()),
            replacement: None,
        }
    }
}

/// A field exposed by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Source column name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, alias = "maskingConfig")]
    pub masking: MaskingConfig,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            masking: MaskingConfig::disabled(),
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn masked(mut self, masking: MaskingConfig) -> Self {
        self.masking = masking;
        self
    }

    pub fn has_masking(&self) -> bool {
        self.masking.enabled
    }

    /// Alias if set and non-blank, otherwise the source name.
    pub fn output_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.trim().is_empty() => alias,
            _ => &self.name,
        }
    }
}
