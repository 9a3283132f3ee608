use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::Feature;

/// Manual per-feature overrides for known source defects.
///
/// Keyed by the feature's stable identifier, then by the upper-case property
/// name. Consulted when the source value is the missing-data sentinel, and
/// for absent properties only when the resolver opts in with
/// [`PropertyResolver::fixing_absent_keys`].
#[derive(Debug, Clone, Default)]
pub struct FixTable {
    fixes: HashMap<String, HashMap<String, String>>,
}

impl FixTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fix(mut self, feature_id: impl Into<String>, field: &str, value: &str) -> Self {
        self.fixes
            .entry(feature_id.into())
            .or_default()
            .insert(field.to_uppercase(), value.to_string());
        self
    }

    pub fn get(&self, feature_id: &str, field: &str) -> Option<&str> {
        self.fixes.get(feature_id)?.get(field).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

/// Which key variant wins when a feature carries several of them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyPrecedence {
    /// Every present variant overwrites the previous one: `key_` beats `KEY_` beats `key` beats `KEY`
    #[default]
    LastMatch,
    /// The first present variant in `KEY`, `key`, `KEY_`, `key_` order wins
    FirstMatch,
}

/// Reads canonical values out of feature properties whose naming drifts
/// between dataset releases.
#[derive(Debug, Clone)]
pub struct PropertyResolver {
    sentinel: String,
    fixes: FixTable,
    precedence: KeyPrecedence,
    fix_absent: bool,
}

impl PropertyResolver {
    pub fn new(sentinel: &str, fixes: FixTable) -> Self {
        Self {
            sentinel: sentinel.to_string(),
            fixes,
            precedence: KeyPrecedence::default(),
            fix_absent: false,
        }
    }

    pub fn with_precedence(mut self, precedence: KeyPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Also apply fixes when no key variant is present, not only on the sentinel
    pub fn fixing_absent_keys(mut self) -> Self {
        self.fix_absent = true;
        self
    }

    /// Key spellings tried for `key`, in scan order
    pub fn candidates(key: &str) -> [String; 4] {
        let upper = key.to_uppercase();
        let lower = key.to_lowercase();
        [upper.clone(), lower.clone(), format!("{}_", upper), format!("{}_", lower)]
    }

    fn raw_value<'a>(&self, feature: &'a Feature, key: &str) -> Option<&'a Value> {
        let mut found = None;
        for candidate in Self::candidates(key) {
            if let Some(value) = feature.properties.get(&candidate) {
                found = Some(value);
                if self.precedence == KeyPrecedence::FirstMatch {
                    break;
                }
            }
        }
        found
    }

    fn is_sentinel(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s == &self.sentinel,
            Value::Number(n) => match (n.as_f64(), self.sentinel.parse::<f64>()) {
                (Some(v), Ok(sentinel)) => v == sentinel,
                _ => false,
            },
            _ => false,
        }
    }

    /// Textual form of a truthy value, `None` for null, empty, false and zero
    fn truthy_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            Value::Bool(true) => Some("true".to_string()),
            _ => None,
        }
    }

    fn resolve_text(&self, feature: &Feature, key: &str) -> Option<String> {
        match self.raw_value(feature, key) {
            Some(value) if !self.is_sentinel(value) => Self::truthy_text(value),
            Some(_) => self.fix(feature, key),
            None if self.fix_absent => self.fix(feature, key),
            None => None,
        }
    }

    fn fix(&self, feature: &Feature, key: &str) -> Option<String> {
        let field = key.to_uppercase();
        let fix = self.fixes.get(&feature.id, &field).filter(|f| !f.is_empty())?;
        debug!("Applying fix {}={} to feature {}", field, fix, feature.id);
        Some(fix.to_string())
    }

    /// Resolve `key` as a lower-cased string
    pub fn resolve(&self, feature: &Feature, key: &str) -> Option<String> {
        self.resolve_text(feature, key).map(|v| v.to_lowercase())
    }

    /// Resolve `key` through a custom cast. The raw text is passed as is.
    pub fn resolve_with<T>(&self, feature: &Feature, key: &str, cast: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let text = self.resolve_text(feature, key)?;
        let value = cast(&text);
        if value.is_none() {
            debug!("Could not cast {}={:?} of feature {}", key, text, feature.id);
        }
        value
    }
}

/// Integer cast accepting float notation (`67059887.0`)
pub fn as_integer(text: &str) -> Option<u64> {
    text.parse::<u64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64)
    })
}
