//! In-memory table model
//!
//! A table is a column-name list plus rows of cells. Every row has exactly one cell per
//! column; a cell is either a string or missing.

use serde::{Deserialize, Serialize};

/// A single cell: `None` is a missing value
pub type Cell = Option<String>;

/// One row, positionally aligned with [`Table::columns`]
pub type Row = Vec<Cell>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table of present string cells (tests and benches)
    pub fn from_strings<C, R, S>(columns: C, rows: R) -> Self
    where
        C: IntoIterator<Item = S>,
        R: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|s| Some(s.into())).collect())
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom; missing cells read as `""`
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).and_then(|c| c.as_deref()).unwrap_or(""))
    }

    /// Append rows from another table with the same columns
    pub fn extend_rows(&mut self, rows: impl IntoIterator<Item = Row>) {
        self.rows.extend(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_values_reads_missing_as_empty() {
        let table = Table {
            columns: vec!["id".into(), "v".into()],
            rows: vec![
                vec![Some("1".into()), None],
                vec![Some("2".into()), Some("x".into())],
            ],
        };
        let vals: Vec<&str> = table.column_values(1).collect();
        assert_eq!(vals, vec!["", "x"]);
        assert_eq!(table.column_index("v"), Some(1));
        assert_eq!(table.column_index("nope"), None);
    }

    #[test]
    fn test_from_strings() {
        let table = Table::from_strings(["a", "b"], vec![vec!["1", "2"]]);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0][1].as_deref(), Some("2"));
    }
}
