//! Tabular payloads produced by collectors and consumed by the output sink.

use serde::{Deserialize, Serialize};

/// Longest table name the output sink accepts. Longer names are cut.
pub const MAX_TABLE_NAME_LEN: usize = 100;

/// One scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Text content if this is a non-blank text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whole numbers become [`Cell::Integer`], everything else [`Cell::Float`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn number(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            Cell::Integer(value as i64)
        } else {
            Cell::Float(value)
        }
    }

    /// Renders the cell the way a spreadsheet would display it.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Bool(b) => (if *b { "Yes" } else { "No" }).to_string(),
            Cell::Integer(n) => n.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Empty, Into::into)
    }
}

/// Ordered columns plus rows of cells.
///
/// Rows shorter than the header are padded with [`Cell::Empty`] on push;
/// longer rows are truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Non-blank text values of `column`, in row order.
    #[must_use]
    pub fn text_column(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(Cell::as_text))
            .map(str::to_string)
            .collect()
    }
}

/// Insertion-ordered mapping from table name to table with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSet {
    entries: Vec<(String, Table)>,
}

impl TableSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `table` under `name`, returning the table it replaced.
    ///
    /// A replaced entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) -> Option<Table> {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(&mut slot.1, table));
        }
        self.entries.push((name, table));
        None
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when at least one table carries a row.
    #[must_use]
    pub fn has_rows(&self) -> bool {
        self.entries.iter().any(|(_, t)| !t.is_empty())
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.len()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl IntoIterator for TableSet {
    type Item = (String, Table);
    type IntoIter = std::vec::IntoIter<(String, Table)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Cuts `s` to at most `max` characters, never splitting a code point.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_pads_short_rows() {
        let mut table = Table::new(["a", "b", "c"]);
        table.push_row(vec![Cell::from("x")]);
        assert_eq!(table.rows[0], vec![Cell::from("x"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn text_column_skips_blank_cells() {
        let mut table = Table::new(["skill", "frequency"]);
        table.push_row(vec!["Python".into(), 3_i64.into()]);
        table.push_row(vec!["  ".into(), 1_i64.into()]);
        table.push_row(vec!["SQL".into(), 2_i64.into()]);
        assert_eq!(table.text_column("skill"), vec!["Python", "SQL"]);
        assert!(table.text_column("missing").is_empty());
    }

    #[test]
    fn table_set_preserves_insertion_order_and_replaces_in_place() {
        let mut set = TableSet::new();
        set.insert("first", Table::new(["a"]));
        set.insert("second", Table::new(["b"]));
        let replaced = set.insert("first", Table::new(["c"]));
        assert!(replaced.is_some());
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(set.get("first").map(|t| t.columns.clone()), Some(vec!["c".to_string()]));
    }

    #[test]
    fn has_rows_ignores_empty_tables() {
        let mut set = TableSet::new();
        set.insert("empty", Table::new(["a"]));
        assert!(!set.has_rows());
        let mut filled = Table::new(["a"]);
        filled.push_row(vec![1_i64.into()]);
        set.insert("filled", filled);
        assert!(set.has_rows());
        assert_eq!(set.total_rows(), 1);
    }

    #[test]
    fn truncate_chars_respects_multibyte_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars(&"x".repeat(150), MAX_TABLE_NAME_LEN).len(), 100);
    }

    #[test]
    fn number_prefers_integers() {
        assert_eq!(Cell::number(80_000.0), Cell::Integer(80_000));
        assert_eq!(Cell::number(45.5), Cell::Float(45.5));
    }

    #[test]
    fn cell_serializes_untagged() {
        let row = vec![Cell::from("a"), Cell::Integer(2), Cell::Empty, Cell::Bool(true)];
        let json = serde_json::to_string(&row).expect("serialize");
        assert_eq!(json, r#"["a",2,null,true]"#);
    }
}
