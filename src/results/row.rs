use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One record materialized from a cursor, in the cursor's column order.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// Column names (shared with every row read from the same page layout)
    pub column_names: Arc<Vec<String>>,
    /// Values in column order; attributes missing from the record are `RowValues::Null`
    pub rows: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let cache = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            rows,
            column_index_cache: cache,
        }
    }

    pub(crate) fn with_cache(
        column_names: Arc<Vec<String>>,
        rows: Vec<RowValues>,
        column_index_cache: Arc<HashMap<String, usize>>,
    ) -> Self {
        Self {
            column_names,
            rows,
            column_index_cache,
        }
    }

    /// Position of `column_name`, or `None` if the row has no such column.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}
