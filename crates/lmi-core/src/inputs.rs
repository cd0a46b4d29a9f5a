//! Declarative input schemas and the generic validator that interprets them.
//!
//! Collectors declare their fields as [`FieldSpec`] values. Callers submit
//! loosely typed JSON ([`RawInputs`]); [`validate_fields`] coerces each value
//! to its declared [`FieldKind`] and checks constraints, and
//! [`resolve_inputs`] produces the typed [`ModuleInputs`] with defaults
//! applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-supplied inputs for one module, before coercion.
pub type RawInputs = serde_json::Map<String, Value>;

/// A coerced input value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Text(value)
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Integer(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

impl From<&[&str]> for InputValue {
    fn from(value: &[&str]) -> Self {
        InputValue::List(value.iter().map(|s| (*s).to_string()).collect())
    }
}

impl From<Vec<String>> for InputValue {
    fn from(value: Vec<String>) -> Self {
        InputValue::List(value)
    }
}

/// Type tag plus constraints for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        min_len: usize,
    },
    Integer {
        min: i64,
        max: i64,
    },
    Select {
        options: &'static [&'static str],
    },
    MultiSelect {
        options: &'static [&'static str],
        min_selected: usize,
    },
    Checkbox,
    /// Comma-separated free-text terms.
    TermList {
        max_items: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<InputValue>,
    pub help: Option<&'static str>,
    pub advanced: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            default: None,
            help: None,
            advanced: false,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<InputValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    #[must_use]
    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Ordered field errors. Valid exactly when no error has been added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<FieldError>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
        self.is_valid = false;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Error for `field`, if one was recorded.
    #[must_use]
    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Typed, defaulted inputs handed to a collector's `execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleInputs(BTreeMap<String, InputValue>);

impl ModuleInputs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<InputValue>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(InputValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(InputValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Non-negative integer as a count, falling back to `default`.
    #[must_use]
    pub fn count(&self, name: &str, default: usize) -> usize {
        self.integer(name)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(default)
    }

    /// Checkbox value; absent means unchecked.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(InputValue::Bool(true)))
    }

    #[must_use]
    pub fn list(&self, name: &str) -> &[String] {
        match self.0.get(name) {
            Some(InputValue::List(items)) => items,
            _ => &[],
        }
    }
}

impl<K: Into<String>, V: Into<InputValue>> FromIterator<(K, V)> for ModuleInputs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Checks `raw` against `fields`, recording errors in declaration order.
///
/// Keys in `raw` that no field declares are ignored.
#[must_use]
pub fn validate_fields(fields: &[FieldSpec], raw: &RawInputs) -> ValidationResult {
    let mut result = ValidationResult::new();
    for spec in fields {
        if let Err(message) = coerce_field(spec, raw.get(spec.name)) {
            result.add_error(spec.name, message);
        }
    }
    result
}

/// Coerces `raw` into typed inputs with defaults applied.
///
/// # Errors
///
/// Returns the [`ValidationResult`] describing every invalid field.
pub fn resolve_inputs(fields: &[FieldSpec], raw: &RawInputs) -> Result<ModuleInputs, ValidationResult> {
    let mut validation = ValidationResult::new();
    let mut inputs = ModuleInputs::new();
    for spec in fields {
        match coerce_field(spec, raw.get(spec.name)) {
            Ok(Some(value)) => inputs.insert(spec.name, value),
            Ok(None) => {}
            Err(message) => validation.add_error(spec.name, message),
        }
    }
    if validation.is_valid() {
        Ok(inputs)
    } else {
        Err(validation)
    }
}

/// Coerces one field, falling back to its default when absent.
fn coerce_field(spec: &FieldSpec, raw: Option<&Value>) -> Result<Option<InputValue>, String> {
    let present = raw.filter(|v| !is_blank(&spec.kind, v));
    let Some(value) = present else {
        if spec.required {
            return Err(format!("{} is required", spec.label));
        }
        return Ok(spec.default.clone());
    };

    match &spec.kind {
        FieldKind::Text { min_len } => {
            let text = scalar_text(value)
                .ok_or_else(|| format!("{} must be text", spec.label))?;
            if text.chars().count() < *min_len {
                return Err(format!(
                    "{} must be at least {min_len} characters",
                    spec.label
                ));
            }
            Ok(Some(InputValue::Text(text)))
        }
        FieldKind::Integer { min, max } => {
            let n = integer_value(value)
                .ok_or_else(|| format!("{} must be a whole number", spec.label))?;
            if n < *min || n > *max {
                return Err(format!("{} must be between {min} and {max}", spec.label));
            }
            Ok(Some(InputValue::Integer(n)))
        }
        FieldKind::Select { options } => {
            let text = scalar_text(value)
                .ok_or_else(|| format!("{} must be one of: {}", spec.label, options.join(", ")))?;
            let option = match_option(options, &text)
                .ok_or_else(|| format!("{} must be one of: {}", spec.label, options.join(", ")))?;
            Ok(Some(InputValue::Text(option.to_string())))
        }
        FieldKind::MultiSelect {
            options,
            min_selected,
        } => {
            let items = list_value(value)
                .ok_or_else(|| format!("{} must be a list", spec.label))?;
            let mut selected: Vec<String> = Vec::with_capacity(items.len());
            for item in &items {
                let option = match_option(options, item).ok_or_else(|| {
                    format!("{} has unknown option '{item}'", spec.label)
                })?;
                if !selected.iter().any(|s| s == option) {
                    selected.push(option.to_string());
                }
            }
            if selected.len() < *min_selected {
                return Err(format!(
                    "Select at least {min_selected} option(s) for {}",
                    spec.label
                ));
            }
            Ok(Some(InputValue::List(selected)))
        }
        FieldKind::Checkbox => bool_value(value)
            .map(|b| Some(InputValue::Bool(b)))
            .ok_or_else(|| format!("{} must be true or false", spec.label)),
        FieldKind::TermList { max_items } => {
            let items = list_value(value)
                .ok_or_else(|| format!("{} must be a comma-separated list", spec.label))?;
            if items.is_empty() {
                if spec.required {
                    return Err(format!("{} is required", spec.label));
                }
                return Ok(spec.default.clone());
            }
            if items.len() > *max_items {
                return Err(format!(
                    "{} accepts at most {max_items} entries",
                    spec.label
                ));
            }
            Ok(Some(InputValue::List(items)))
        }
    }
}

/// Null and blank strings are treated as absent. An explicit empty list is
/// absent for free-text lists but counts as a (possibly too small) selection
/// for multi-selects.
fn is_blank(kind: &FieldKind, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty() && !matches!(kind, FieldKind::MultiSelect { .. }),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn list_value(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Case-insensitive option lookup returning the canonical spelling.
fn match_option(options: &'static [&'static str], candidate: &str) -> Option<&'static str> {
    let candidate = candidate.trim();
    options
        .iter()
        .copied()
        .find(|o| o.eq_ignore_ascii_case(candidate))
}

#[cfg(test)]
#[path = "inputs_test.rs"]
mod tests;
