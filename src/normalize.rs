//! Cell normalization and canonical row order
//!
//! Both inputs must go through the same rule here: the positional diff assumes row `i` on
//! the left corresponds to row `i` on the right, which only holds if both tables were
//! sorted by the same key with the same tie-break.

use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Replace missing cells with `""` and stably sort rows ascending by the string value of
/// column `sort_key_column_index` (byte-wise). Equal keys keep their ingest order.
pub fn normalize(mut table: Table, sort_key_column_index: usize) -> Result<Table> {
    if sort_key_column_index >= table.column_count() {
        return Err(PipelineError::Config(format!(
            "sort key column {} out of range for a table with {} column(s)",
            sort_key_column_index,
            table.column_count()
        )));
    }

    for row in table.rows.iter_mut() {
        for cell in row.iter_mut() {
            if cell.is_none() {
                *cell = Some(String::new());
            }
        }
    }

    // `sort_by` is stable
    table.rows.sort_by(|a, b| {
        sort_key(a, sort_key_column_index).cmp(sort_key(b, sort_key_column_index))
    });
    Ok(table)
}

fn sort_key(row: &[Option<String>], idx: usize) -> &str {
    row.get(idx).and_then(|c| c.as_deref()).unwrap_or("")
}

/// True if rows are in non-decreasing key order
pub fn is_sorted_by_key(table: &Table, sort_key_column_index: usize) -> bool {
    table.rows.windows(2).all(|pair| {
        sort_key(&pair[0], sort_key_column_index) <= sort_key(&pair[1], sort_key_column_index)
    })
}
