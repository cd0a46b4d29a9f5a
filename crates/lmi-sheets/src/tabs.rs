//! Tab naming and cell rendering for spreadsheet output.

use lmi_core::{truncate_chars, Cell, Table, MAX_TABLE_NAME_LEN};
use serde_json::{json, Value};

/// Characters Google Sheets rejects in tab titles.
const FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Replaces forbidden characters with `-` and truncates to the tab title limit.
pub(crate) fn sanitize_tab_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '-' } else { c })
        .collect();
    let trimmed = truncate_chars(cleaned.trim(), MAX_TABLE_NAME_LEN);
    if trimmed.is_empty() {
        "Sheet".to_string()
    } else {
        trimmed
    }
}

/// Sanitised tab titles, made unique with a ` (n)` suffix.
///
/// Uniqueness is case-insensitive, matching how Sheets compares titles.
pub(crate) fn unique_tab_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for name in names {
        let base = sanitize_tab_name(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.iter().any(|t| t.eq_ignore_ascii_case(&candidate)) {
            let suffix = format!(" ({n})");
            let room = MAX_TABLE_NAME_LEN.saturating_sub(suffix.chars().count());
            candidate = format!("{}{suffix}", truncate_chars(&base, room));
            n += 1;
        }
        taken.push(candidate.to_lowercase());
        out.push(candidate);
    }
    out
}

/// A1 range covering a whole tab, with the title quoted.
pub(crate) fn a1_range(tab: &str) -> String {
    format!("'{}'!A1", tab.replace('\'', "''"))
}

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Integer(n) => json!(n),
        Cell::Float(f) if f.is_finite() => json!(f),
        other => Value::String(other.display()),
    }
}

/// Header row followed by one row per table row.
pub(crate) fn table_values(table: &Table) -> Vec<Vec<Value>> {
    let mut values = Vec::with_capacity(table.rows.len() + 1);
    values.push(
        table
            .columns
            .iter()
            .map(|c| Value::String(c.clone()))
            .collect(),
    );
    values.extend(
        table
            .rows
            .iter()
            .map(|row| row.iter().map(cell_value).collect()),
    );
    values
}
