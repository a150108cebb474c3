//! Growable typed columns
//!
//! Three storage variants cover the seven wire types: a typed contiguous
//! buffer for the fixed-width types, parallel offset/byte arrays for utf8,
//! and a three-level index for list_utf8. Buffers grow by `Vec`'s amortised
//! doubling; columns never shrink.
//!
//! Offsets are stored store-absolute. Appending a parsed batch fragment
//! rebases its batch-relative offsets by the column's pre-append sizes;
//! slicing rebases back down to zero so the slice is a self-contained wire
//! block.

use crate::codec::parser::ColumnValues;
use crate::error::{EngineError, Result};
use crate::types::ColumnType;

/// Typed backing storage for one column.
#[derive(Debug, Clone, PartialEq)]
enum ColumnData {
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    Bool(Vec<u8>),
    Utf8 {
        /// `rows + 1` absolute byte offsets, `offsets[0] == 0`
        offsets: Vec<u32>,
        bytes: Vec<u8>,
    },
    ListUtf8 {
        /// `rows + 1` absolute item indices
        row_offsets: Vec<u32>,
        /// `items + 1` absolute byte offsets
        item_offsets: Vec<u32>,
        bytes: Vec<u8>,
    },
}

impl ColumnData {
    fn new(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::F64 | ColumnType::TimestampMs => ColumnData::F64(Vec::new()),
            ColumnType::I32 => ColumnData::I32(Vec::new()),
            ColumnType::U32 => ColumnData::U32(Vec::new()),
            ColumnType::Bool => ColumnData::Bool(Vec::new()),
            ColumnType::Utf8 => ColumnData::Utf8 {
                offsets: vec![0],
                bytes: Vec::new(),
            },
            ColumnType::ListUtf8 => ColumnData::ListUtf8 {
                row_offsets: vec![0],
                item_offsets: vec![0],
                bytes: Vec::new(),
            },
        }
    }
}

/// A single growable column. Created at INIT, lives for the store's lifetime,
/// only grows.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            data: ColumnData::new(column_type),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Rows currently addressable in this column.
    ///
    /// For list columns a row counts only if its item range lies within the
    /// item index; a buggy encoder that declares more items in `rowOffsets`
    /// than the item index carries leaves trailing rows unaddressable, which
    /// the store's post-commit integrity check turns into an error.
    pub fn row_count(&self) -> u32 {
        match &self.data {
            ColumnData::F64(v) => v.len() as u32,
            ColumnData::I32(v) => v.len() as u32,
            ColumnData::U32(v) => v.len() as u32,
            ColumnData::Bool(v) => v.len() as u32,
            ColumnData::Utf8 { offsets, .. } => (offsets.len() - 1) as u32,
            ColumnData::ListUtf8 {
                row_offsets,
                item_offsets,
                ..
            } => {
                let items = (item_offsets.len() - 1) as u32;
                row_offsets[1..].iter().take_while(|&&o| o <= items).count() as u32
            }
        }
    }

    /// Append a parsed batch fragment, rebasing its batch-relative offsets to
    /// store-absolute ones.
    ///
    /// Shape agreement is established by the store's schema pre-check; a
    /// disagreeing fragment is rejected here as a mismatch without mutating
    /// the column.
    pub fn append(&mut self, values: &ColumnValues, column_index: usize) -> Result<()> {
        match (&mut self.data, values) {
            (ColumnData::F64(store), ColumnValues::F64(frag)) => store.extend_from_slice(frag),
            (ColumnData::I32(store), ColumnValues::I32(frag)) => store.extend_from_slice(frag),
            (ColumnData::U32(store), ColumnValues::U32(frag)) => store.extend_from_slice(frag),
            (ColumnData::Bool(store), ColumnValues::Bool(frag)) => store.extend_from_slice(frag),
            (
                ColumnData::Utf8 { offsets, bytes },
                ColumnValues::Utf8 {
                    offsets: frag_offsets,
                    bytes: frag_bytes,
                },
            ) => {
                let base = bytes.len() as u32;
                offsets.extend(frag_offsets[1..].iter().map(|o| o + base));
                bytes.extend_from_slice(frag_bytes);
            }
            (
                ColumnData::ListUtf8 {
                    row_offsets,
                    item_offsets,
                    bytes,
                },
                ColumnValues::ListUtf8 {
                    row_offsets: frag_rows,
                    item_offsets: frag_items,
                    bytes: frag_bytes,
                },
            ) => {
                let base_items = (item_offsets.len() - 1) as u32;
                let base_bytes = bytes.len() as u32;
                row_offsets.extend(frag_rows[1..].iter().map(|o| o + base_items));
                item_offsets.extend(frag_items[1..].iter().map(|o| o + base_bytes));
                bytes.extend_from_slice(frag_bytes);
            }
            (_, frag) => {
                return Err(EngineError::SchemaMismatch {
                    column_index,
                    name: self.name.clone(),
                    expected: self.column_type,
                    got: fragment_kind(frag),
                })
            }
        }
        Ok(())
    }

    /// Copy rows `[start, start + count)` out as a self-contained wire data
    /// block (offsets rebased to zero). The caller clamps the range; the
    /// returned buffer never aliases column storage.
    pub fn copy_slice(&self, start: u32, count: u32) -> Vec<u8> {
        let start = start as usize;
        let count = count as usize;
        match &self.data {
            ColumnData::F64(v) => {
                let mut out = Vec::with_capacity(count * 8);
                for value in &v[start..start + count] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
                out
            }
            ColumnData::I32(v) => {
                let mut out = Vec::with_capacity(count * 4);
                for value in &v[start..start + count] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
                out
            }
            ColumnData::U32(v) => {
                let mut out = Vec::with_capacity(count * 4);
                for value in &v[start..start + count] {
                    out.extend_from_slice(&value.to_le_bytes());
                }
                out
            }
            ColumnData::Bool(v) => v[start..start + count].to_vec(),
            ColumnData::Utf8 { offsets, bytes } => {
                let base = offsets[start];
                let end = offsets[start + count];
                let mut out = Vec::with_capacity((count + 1) * 4 + (end - base) as usize);
                for offset in &offsets[start..=start + count] {
                    out.extend_from_slice(&(offset - base).to_le_bytes());
                }
                out.extend_from_slice(&bytes[base as usize..end as usize]);
                out
            }
            ColumnData::ListUtf8 {
                row_offsets,
                item_offsets,
                bytes,
            } => {
                let items = (item_offsets.len() - 1) as u32;
                let first_item = row_offsets[start].min(items);
                let last_item = row_offsets[start + count].min(items);
                let slice_items = last_item - first_item;
                let byte_base = item_offsets[first_item as usize];
                let byte_end = item_offsets[last_item as usize];

                let mut out = Vec::with_capacity(
                    4 + (count + 1) * 4
                        + (slice_items as usize + 1) * 4
                        + (byte_end - byte_base) as usize,
                );
                out.extend_from_slice(&slice_items.to_le_bytes());
                for offset in &row_offsets[start..=start + count] {
                    out.extend_from_slice(&(offset.min(&items) - first_item).to_le_bytes());
                }
                for offset in &item_offsets[first_item as usize..=last_item as usize] {
                    out.extend_from_slice(&(offset - byte_base).to_le_bytes());
                }
                out.extend_from_slice(&bytes[byte_base as usize..byte_end as usize]);
                out
            }
        }
    }

    /// Total byte size of the column's backing buffers (diagnostics).
    pub fn byte_size(&self) -> usize {
        match &self.data {
            ColumnData::F64(v) => v.len() * 8,
            ColumnData::I32(v) => v.len() * 4,
            ColumnData::U32(v) => v.len() * 4,
            ColumnData::Bool(v) => v.len(),
            ColumnData::Utf8 { offsets, bytes } => offsets.len() * 4 + bytes.len(),
            ColumnData::ListUtf8 {
                row_offsets,
                item_offsets,
                bytes,
            } => row_offsets.len() * 4 + item_offsets.len() * 4 + bytes.len(),
        }
    }
}

fn fragment_kind(values: &ColumnValues) -> ColumnType {
    match values {
        ColumnValues::F64(_) => ColumnType::F64,
        ColumnValues::I32(_) => ColumnType::I32,
        ColumnValues::U32(_) => ColumnType::U32,
        ColumnValues::Bool(_) => ColumnType::Bool,
        ColumnValues::Utf8 { .. } => ColumnType::Utf8,
        ColumnValues::ListUtf8 { .. } => ColumnType::ListUtf8,
    }
}
