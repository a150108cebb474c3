//! Row-record encoder
//!
//! Turns an ordered sequence of record maps into one contiguous wire buffer.
//! Values are coerced per column type rather than rejected: the encoder never
//! fails on a value, it normalises it.
//!
//! # Coercion rules
//!
//! - missing / null numeric -> 0
//! - fractional input to integer columns truncates toward zero
//! - non-boolean input to `bool` -> 1 iff truthy (non-zero non-NaN number,
//!   non-empty string, any list)
//! - missing or non-text `utf8` -> empty string
//! - non-list `list_utf8` -> empty list

use crate::codec::{BATCH_MAGIC, COL_DESC_BYTES, HEADER_BYTES};
use crate::types::{BatchSeq, ColumnSchema, ColumnType};
use std::collections::HashMap;

/// A single cell value supplied by the producer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Absent / null
    #[default]
    Null,
    Number(f64),
    Bool(bool),
    Text(String),
    TextList(Vec<String>),
}

impl CellValue {
    fn as_f64(&self) -> f64 {
        match self {
            CellValue::Number(v) => *v,
            CellValue::Bool(true) => 1.0,
            CellValue::Bool(false) => 0.0,
            CellValue::Null | CellValue::Text(_) | CellValue::TextList(_) => 0.0,
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            CellValue::Null => false,
            CellValue::Number(v) => *v != 0.0 && !v.is_nan(),
            CellValue::Bool(b) => *b,
            CellValue::Text(s) => !s.is_empty(),
            CellValue::TextList(_) => true,
        }
    }

    fn as_str(&self) -> &str {
        match self {
            CellValue::Text(s) => s,
            _ => "",
        }
    }

    fn as_list(&self) -> &[String] {
        match self {
            CellValue::TextList(items) => items,
            _ => &[],
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<Vec<String>> for CellValue {
    fn from(v: Vec<String>) -> Self {
        CellValue::TextList(v)
    }
}

/// One row of producer input, keyed by column name.
pub type Record = HashMap<String, CellValue>;

/// Encode `rows` under `schema` into a wire buffer carrying `seq`.
pub fn encode_batch(schema: &[ColumnSchema], rows: &[Record], seq: BatchSeq) -> Vec<u8> {
    let blocks: Vec<Vec<u8>> = schema
        .iter()
        .map(|col| encode_column(col, rows))
        .collect();

    let data_len: usize = blocks.iter().map(Vec::len).sum();
    let mut buf = Vec::with_capacity(HEADER_BYTES + schema.len() * COL_DESC_BYTES + data_len);

    buf.extend_from_slice(&BATCH_MAGIC.to_le_bytes());
    buf.extend_from_slice(&seq.get().to_le_bytes());
    buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(schema.len() as u32).to_le_bytes());

    for (col, block) in schema.iter().zip(&blocks) {
        buf.extend_from_slice(&col.column_type.tag().to_le_bytes());
        buf.extend_from_slice(&(block.len() as u32).to_le_bytes());
    }
    for block in &blocks {
        buf.extend_from_slice(block);
    }
    buf
}

fn encode_column(col: &ColumnSchema, rows: &[Record]) -> Vec<u8> {
    let cell = |row: &Record| row.get(&col.name).cloned().unwrap_or_default();

    match col.column_type {
        ColumnType::F64 | ColumnType::TimestampMs => {
            let mut block = Vec::with_capacity(rows.len() * 8);
            for row in rows {
                block.extend_from_slice(&cell(row).as_f64().to_le_bytes());
            }
            block
        }
        ColumnType::I32 => {
            let mut block = Vec::with_capacity(rows.len() * 4);
            for row in rows {
                block.extend_from_slice(&(cell(row).as_f64() as i32).to_le_bytes());
            }
            block
        }
        ColumnType::U32 => {
            let mut block = Vec::with_capacity(rows.len() * 4);
            for row in rows {
                block.extend_from_slice(&(cell(row).as_f64() as u32).to_le_bytes());
            }
            block
        }
        ColumnType::Bool => rows.iter().map(|row| cell(row).is_truthy() as u8).collect(),
        ColumnType::Utf8 => {
            let mut offsets = Vec::with_capacity((rows.len() + 1) * 4);
            let mut bytes = Vec::new();
            offsets.extend_from_slice(&0u32.to_le_bytes());
            for row in rows {
                let value = cell(row);
                bytes.extend_from_slice(value.as_str().as_bytes());
                offsets.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            }
            let mut block = Vec::with_capacity(offsets.len() + bytes.len());
            block.extend_from_slice(&offsets);
            block.extend_from_slice(&bytes);
            block
        }
        ColumnType::ListUtf8 => {
            let mut row_offsets = Vec::with_capacity((rows.len() + 1) * 4);
            let mut item_offsets = Vec::new();
            let mut bytes = Vec::new();
            let mut total_items = 0u32;

            row_offsets.extend_from_slice(&0u32.to_le_bytes());
            item_offsets.extend_from_slice(&0u32.to_le_bytes());
            for row in rows {
                let value = cell(row);
                for item in value.as_list() {
                    bytes.extend_from_slice(item.as_bytes());
                    item_offsets.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                    total_items += 1;
                }
                row_offsets.extend_from_slice(&total_items.to_le_bytes());
            }

            let mut block =
                Vec::with_capacity(4 + row_offsets.len() + item_offsets.len() + bytes.len());
            block.extend_from_slice(&total_items.to_le_bytes());
            block.extend_from_slice(&row_offsets);
            block.extend_from_slice(&item_offsets);
            block.extend_from_slice(&bytes);
            block
        }
    }
}
