use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved pseudo-column names carrying metadata rather than fetched data.
pub mod pseudo {
    pub const PREFIX: &str = "__";
    pub const TIME: &str = "__time";
    pub const STALE: &str = "__stale";
    pub const TRIES: &str = "__tries";
    pub const FILE: &str = "__file";
    pub const ARCHIVED_FILE: &str = "__archived_file";
    pub const TEXT: &str = "__text";
    pub const START: &str = "__start";
    pub const END: &str = "__end";
    pub const COMMENTS: &str = "__comments";
}

pub fn is_pseudo(name: &str) -> bool {
    name.starts_with(pseudo::PREFIX)
}

/// External field name -> ordered values, one row per index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnValueSet {
    columns: IndexMap<String, Vec<String>>,
}

impl ColumnValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: &str, value: impl Into<String>) {
        self.columns
            .entry(column.to_string())
            .or_default()
            .push(value.into());
    }

    /// Replace a column wholesale.
    pub fn set(&mut self, column: &str, values: Vec<String>) {
        self.columns.insert(column.to_string(), values);
    }

    /// Single-valued metadata column.
    pub fn set_meta(&mut self, column: &str, value: impl Into<String>) {
        self.columns.insert(column.to_string(), vec![value.into()]);
    }

    pub fn get(&self, column: &str) -> Option<&Vec<String>> {
        self.columns.get(column)
    }

    /// Exact lookup, falling back to a case-insensitive match.
    pub fn find(&self, column: &str) -> Option<(&String, &Vec<String>)> {
        if let Some(entry) = self.columns.get_key_value(column) {
            return Some(entry);
        }
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Vec<String>> {
        self.columns.shift_remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.columns.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Vec<String>)> {
        self.columns.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Longest column length.
    pub fn row_count(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Row count over data columns only.
    pub fn data_row_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|(name, _)| !is_pseudo(name))
            .map(|(_, values)| values.len())
            .max()
            .unwrap_or(0)
    }

    /// True when at least one non-metadata value exists.
    pub fn has_data(&self) -> bool {
        self.columns
            .iter()
            .any(|(name, values)| !is_pseudo(name) && !values.is_empty())
    }

    /// Pad every data column to the same length with empty strings.
    pub fn pad_rows(&mut self) {
        let rows = self.data_row_count();
        for (name, values) in self.columns.iter_mut() {
            if !is_pseudo(name) && values.len() < rows {
                values.resize(rows, String::new());
            }
        }
    }

    /// Append `other` below the current rows, recording `provenance` in
    /// `provenance_column` for each appended row.
    pub fn append_rows(&mut self, other: ColumnValueSet, provenance_column: &str, provenance: &str) {
        let offset = self.data_row_count();
        let added = other.data_row_count().max(1);

        for (name, values) in other.columns {
            if is_pseudo(&name) && name != provenance_column {
                // Keep the first occurrence of per-fetch metadata.
                self.columns.entry(name).or_insert(values);
                continue;
            }
            let column = self.columns.entry(name).or_default();
            if column.len() < offset {
                column.resize(offset, String::new());
            }
            let count = values.len();
            column.extend(values);
            if count < added {
                column.resize(offset + added, String::new());
            }
        }

        let column = self
            .columns
            .entry(provenance_column.to_string())
            .or_default();
        if column.len() < offset {
            column.resize(offset, String::new());
        }
        column.extend(std::iter::repeat_n(provenance.to_string(), added));
        self.pad_rows();
    }

    pub fn into_inner(self) -> IndexMap<String, Vec<String>> {
        self.columns
    }
}

impl From<IndexMap<String, Vec<String>>> for ColumnValueSet {
    fn from(columns: IndexMap<String, Vec<String>>) -> Self {
        Self { columns }
    }
}

impl FromIterator<(String, Vec<String>)> for ColumnValueSet {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Ordered, de-duplicated error messages for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    messages: Vec<String>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    pub fn extend(&mut self, other: ErrorList) {
        for message in other.messages {
            self.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.messages.iter()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}
