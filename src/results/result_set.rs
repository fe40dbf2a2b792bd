use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::types::RowValues;

/// Every row drained from a cursor.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows read, in cursor order
    pub results: Vec<CustomDbRow>,
    /// Number of rows collected
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names shared by rows added through [`add_row_values`](Self::add_row_values).
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row laid out in the current column order. Ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        else {
            return;
        };
        self.results.push(CustomDbRow::with_cache(
            column_names.clone(),
            row_values,
            cache.clone(),
        ));
        self.rows_affected += 1;
    }

    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_names = Some(row.column_names.clone());
            self.column_index_cache = Some(row.column_index_cache.clone());
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
