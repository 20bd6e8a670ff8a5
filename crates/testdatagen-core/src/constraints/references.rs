use std::collections::{BTreeMap, HashSet};

use crate::value::Value;

use super::context::{Record, ReferenceResolver};

/// Reference resolver backed by rows held in memory.
#[derive(Debug, Default)]
pub struct InMemoryReferences {
    columns: BTreeMap<String, BTreeMap<String, HashSet<String>>>,
    rows: BTreeMap<String, Vec<Record>>,
}

impl InMemoryReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(table: &str, rows: Vec<Record>) -> Self {
        let mut references = Self::new();
        references.ingest_table(table, rows);
        references
    }

    /// Add rows of `table`; earlier rows of the same table are kept.
    pub fn ingest_table(&mut self, table: &str, rows: impl IntoIterator<Item = Record>) {
        let columns = self.columns.entry(table.to_string()).or_default();
        let stored = self.rows.entry(table.to_string()).or_default();
        for row in rows {
            for (column, value) in &row {
                if !value.is_null() {
                    columns.entry(column.clone()).or_default().insert(value.key());
                }
            }
            stored.push(row);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows.get(table).map_or(0, Vec::len)
    }
}

impl ReferenceResolver for InMemoryReferences {
    fn exists(&self, table: &str, column: &str, value: &Value) -> bool {
        self.columns
            .get(table)
            .and_then(|columns| columns.get(column))
            .is_some_and(|values| values.contains(&value.key()))
    }

    fn exists_composite(&self, table: &str, columns: &[String], values: &[Value]) -> bool {
        let Some(rows) = self.rows.get(table) else {
            return false;
        };
        rows.iter().any(|row| {
            columns.iter().zip(values).all(|(column, expected)| {
                row.get(column)
                    .is_some_and(|actual| actual.key() == expected.key())
            })
        })
    }
}
