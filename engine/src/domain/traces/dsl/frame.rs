//! Tabular result of a span query.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Rows of JSON values with named index and value columns.
///
/// Each row holds the index values first, followed by one value per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpanFrame {
    pub index_names: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl SpanFrame {
    /// Build a frame from labeled records. Columns appear in order of first
    /// use; values missing from a record are null.
    pub(crate) fn from_records(index_names: Vec<String>, records: Vec<Vec<(String, JsonValue)>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for (label, _) in records.iter().flatten() {
            if !index_names.contains(label) && !columns.contains(label) {
                columns.push(label.clone());
            }
        }

        let rows = records
            .into_iter()
            .map(|record| {
                index_names
                    .iter()
                    .chain(columns.iter())
                    .map(|name| {
                        record
                            .iter()
                            .rev()
                            .find(|(label, _)| label == name)
                            .map(|(_, value)| value.clone())
                            .unwrap_or(JsonValue::Null)
                    })
                    .collect()
            })
            .collect();

        Self {
            index_names,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index_names
            .iter()
            .chain(self.columns.iter())
            .position(|n| n == name)
    }

    /// Values of an index or value column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&JsonValue>> {
        let i = self.position(name)?;
        Some(self.rows.iter().map(|row| &row[i]).collect())
    }

    /// Index values of every row.
    pub fn index(&self) -> Vec<&[JsonValue]> {
        let width = self.index_names.len();
        self.rows.iter().map(|row| &row[..width]).collect()
    }

    /// Rows as objects keyed by index and column names.
    pub fn records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.index_names
                    .iter()
                    .chain(self.columns.iter())
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Rename index and value columns; unknown names are ignored.
    pub fn rename(&mut self, renames: &[(String, String)]) {
        for (old, new) in renames {
            for name in self.index_names.iter_mut().chain(self.columns.iter_mut()) {
                if name == old {
                    *name = new.clone();
                }
            }
        }
    }
}
