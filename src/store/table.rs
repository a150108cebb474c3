//! Column store and batch commit protocol
//!
//! Owns one growable column per schema entry. Ingest follows a strict order:
//! schema pre-check (no mutation on mismatch), append all columns, then a
//! post-commit integrity check that every column agrees on the new row total.

use crate::codec::parser::ParsedBatch;
use crate::error::{EngineError, Result};
use crate::store::column::Column;
use crate::types::{ColumnSchema, RowIndex};

/// The worker-owned column set.
#[derive(Debug)]
pub struct ColumnStore {
    schema: Vec<ColumnSchema>,
    columns: Vec<Column>,
    total_rows: u32,
}

impl ColumnStore {
    /// Create the columns for `schema`. Columns live as long as the store and
    /// only grow.
    pub fn new(schema: Vec<ColumnSchema>) -> Self {
        let columns = schema
            .iter()
            .map(|col| Column::new(col.name.clone(), col.column_type))
            .collect();
        Self {
            schema,
            columns,
            total_rows: 0,
        }
    }

    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn total_rows(&self) -> u32 {
        self.total_rows
    }

    /// Commit a parsed batch.
    ///
    /// Pre-checks column types over the shared prefix of batch and schema;
    /// a mismatch rejects the batch before any column is touched. The
    /// post-check compares every column's row count against the new expected
    /// total — a divergence means the encoder produced internally inconsistent
    /// data, which poisons the store (the caller decides what that means for
    /// the stream).
    pub fn ingest(&mut self, batch: &ParsedBatch) -> Result<()> {
        let shared = batch.columns.len().min(self.columns.len());
        for i in 0..shared {
            let expected = self.schema[i].column_type;
            let got = batch.columns[i].column_type;
            if got != expected {
                return Err(EngineError::SchemaMismatch {
                    column_index: i,
                    name: self.schema[i].name.clone(),
                    expected,
                    got,
                });
            }
        }

        let expected_rows = self.total_rows.checked_add(batch.row_count).ok_or_else(|| {
            EngineError::IntegrityViolation {
                column_name: "total_rows".to_string(),
                column_rows: u32::MAX,
                expected_rows: u32::MAX,
            }
        })?;

        for (i, parsed) in batch.columns.iter().take(shared).enumerate() {
            self.columns[i].append(&parsed.values, i)?;
        }

        for column in &self.columns {
            let rows = column.row_count();
            if rows != expected_rows {
                return Err(EngineError::IntegrityViolation {
                    column_name: column.name().to_string(),
                    column_rows: rows,
                    expected_rows,
                });
            }
        }

        self.total_rows = expected_rows;
        tracing::trace!(
            rows = batch.row_count,
            total = self.total_rows,
            "batch committed"
        );
        Ok(())
    }

    /// Clamp a requested row range to the rows actually present.
    pub fn clamp_range(&self, start: RowIndex, count: u32) -> (RowIndex, u32) {
        let start = start.0.min(self.total_rows);
        let actual = count.min(self.total_rows - start);
        (RowIndex(start), actual)
    }
}
