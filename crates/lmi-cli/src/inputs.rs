//! Loading module inputs from JSON files and `--set` overrides.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use lmi_core::{ModuleKind, RawInputs};
use lmi_pipeline::{ModuleRegistry, RunRequest};
use serde_json::Value;

use crate::report;

/// Reads a file mapping module name to its raw fields.
pub(crate) fn load_inputs_file(path: &Path) -> anyhow::Result<BTreeMap<String, RawInputs>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inputs file {}", path.display()))?;
    parse_inputs(&text).with_context(|| format!("invalid inputs file {}", path.display()))
}

fn parse_inputs(text: &str) -> anyhow::Result<BTreeMap<String, RawInputs>> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(modules) = value else {
        anyhow::bail!("expected a JSON object keyed by module name");
    };
    modules
        .into_iter()
        .map(|(name, fields)| match fields {
            Value::Object(fields) => Ok((name, fields)),
            _ => anyhow::bail!("inputs for '{name}' must be a JSON object"),
        })
        .collect()
}

/// Reads one module's fields. Accepts either the bare field object or a
/// map keyed by module name.
pub(crate) fn load_module_inputs(path: &Path, kind: ModuleKind) -> anyhow::Result<RawInputs> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inputs file {}", path.display()))?;
    module_section(&text, kind).with_context(|| format!("invalid inputs file {}", path.display()))
}

fn module_section(text: &str, kind: ModuleKind) -> anyhow::Result<RawInputs> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        anyhow::bail!("expected a JSON object");
    };
    let key = object
        .iter()
        .find(|(name, fields)| fields.is_object() && name.parse::<ModuleKind>().ok() == Some(kind))
        .map(|(name, _)| name.clone());
    match key.and_then(|k| object.remove(&k)) {
        Some(Value::Object(fields)) => Ok(fields),
        _ => Ok(object),
    }
}

/// Applies `module.field=value`. The value is passed through as text and
/// coerced by the module's field schema.
pub(crate) fn apply_override(
    inputs: &mut BTreeMap<String, RawInputs>,
    raw: &str,
) -> anyhow::Result<()> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("override '{raw}' must look like module.field=value"))?;
    let (module, field) = path
        .split_once('.')
        .filter(|(m, f)| !m.trim().is_empty() && !f.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("override '{raw}' must look like module.field=value"))?;
    let kind: ModuleKind = module.parse()?;

    inputs
        .entry(kind.as_str().to_string())
        .or_default()
        .insert(field.trim().to_string(), Value::String(value.to_string()));
    Ok(())
}

/// Validates every selected module before anything touches the network.
/// Prints failures and returns `false` when any module is invalid.
pub(crate) fn validate_request(
    registry: &ModuleRegistry,
    request: &RunRequest,
) -> anyhow::Result<bool> {
    let mut valid = true;
    for name in &request.selected_modules {
        let kind: ModuleKind = name.parse()?;
        let collector = registry
            .get(kind)
            .ok_or_else(|| anyhow::anyhow!("module '{kind}' is not registered"))?;
        let raw = request.inputs_for(kind).cloned().unwrap_or_default();
        let validation = collector.validate(&raw);
        if !validation.is_valid() {
            report::print_validation(kind, &validation);
            valid = false;
        }
    }
    Ok(valid)
}
