//! Positional table diff
//!
//! Headers are compared as name sequences. Row values are compared per shared column by
//! index, after stripping one leading and one trailing double quote from each value.
//! Nothing else is normalized: `"1"` and `"1.0"` differ, and so do `"  x"` and `"x"`.

use crate::table::Table;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

const SEPARATOR_WIDTH: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeaderDiff {
    Identical,
    /// `missing`: only in left; `added`: only in right. Each list keeps its own table's
    /// column order. Both may be empty when the same names appear in a different order.
    Different {
        missing: Vec<String>,
        added: Vec<String>,
    },
}

/// One differing cell; `row` is 1-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellDiff {
    pub row: usize,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDiff {
    pub column: String,
    pub cells: Vec<CellDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub header: HeaderDiff,
    /// Shared columns with at least one differing row, in left column order
    pub columns: Vec<ColumnDiff>,
    /// When set, the rendered report prints only the summary line for rows
    pub no_row_differences: bool,
}

impl DiffReport {
    pub fn is_identical(&self) -> bool {
        self.header == HeaderDiff::Identical && self.no_row_differences
    }

    pub fn differing_cells(&self) -> usize {
        self.columns.iter().map(|c| c.cells.len()).sum()
    }

    /// Text report: header section, separator, row section
    pub fn render(&self) -> String {
        let mut out = String::new();

        match &self.header {
            HeaderDiff::Identical => out.push_str("No different headers.\n"),
            HeaderDiff::Different { missing, added } => {
                out.push_str("Different headers:\n");
                let pairs = missing.len().max(added.len());
                for i in 0..pairs {
                    let left = missing.get(i).map(String::as_str).unwrap_or("");
                    let right = added.get(i).map(String::as_str).unwrap_or("");
                    out.push_str(&format!("{} => {}\n", left, right));
                }
            }
        }

        out.push_str(&"-".repeat(SEPARATOR_WIDTH));
        out.push('\n');

        // Per-column text is built regardless; the global flag decides what is emitted
        let mut column_text = String::new();
        for column in &self.columns {
            column_text.push_str(&format!("Differences in column {}:\n", column.column));
            for cell in &column.cells {
                column_text.push_str(&format!(
                    "Row {}: {} => {}\n",
                    cell.row, cell.left, cell.right
                ));
            }
        }

        if self.no_row_differences {
            out.push_str("No different rows.\n");
        } else {
            out.push_str(&column_text);
        }
        out
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Remove one leading and one trailing `"`, if present
pub fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

pub fn diff_headers(left: &Table, right: &Table) -> HeaderDiff {
    if left.columns == right.columns {
        return HeaderDiff::Identical;
    }
    let left_set: HashSet<&str> = left.columns.iter().map(String::as_str).collect();
    let right_set: HashSet<&str> = right.columns.iter().map(String::as_str).collect();

    HeaderDiff::Different {
        missing: left
            .columns
            .iter()
            .filter(|c| !right_set.contains(c.as_str()))
            .cloned()
            .collect(),
        added: right
            .columns
            .iter()
            .filter(|c| !left_set.contains(c.as_str()))
            .cloned()
            .collect(),
    }
}

/// Compare one column pair by index up to the shorter length
pub fn diff_column<'a>(
    left: impl Iterator<Item = &'a str>,
    right: impl Iterator<Item = &'a str>,
) -> Vec<CellDiff> {
    left.zip(right)
        .enumerate()
        .filter_map(|(i, (l, r))| {
            let (l, r) = (strip_quotes(l), strip_quotes(r));
            (l != r).then(|| CellDiff {
                row: i + 1,
                left: l.to_string(),
                right: r.to_string(),
            })
        })
        .collect()
}

/// Diff two (already normalized and sorted) tables
pub fn diff(left: &Table, right: &Table) -> DiffReport {
    let header = diff_headers(left, right);

    let mut columns = Vec::new();
    for (left_idx, name) in left.columns.iter().enumerate() {
        let Some(right_idx) = right.column_index(name) else {
            continue;
        };
        let cells = diff_column(left.column_values(left_idx), right.column_values(right_idx));
        if !cells.is_empty() {
            columns.push(ColumnDiff {
                column: name.clone(),
                cells,
            });
        }
    }

    let no_row_differences = columns.is_empty();
    DiffReport {
        header,
        columns,
        no_row_differences,
    }
}
