//! Wire-buffer parser
//!
//! Decodes a batch buffer into typed, owned column views. The input buffer's
//! base address carries no alignment guarantee, so every fixed-width block is
//! copied element-wise into an aligned `Vec` rather than reinterpreted in
//! place.
//!
//! Three failure modes, all local to the offending batch:
//! [`EngineError::InvalidMagic`], [`EngineError::UnknownTypeTag`] and
//! [`EngineError::Truncated`].

use crate::codec::{BATCH_MAGIC, COL_DESC_BYTES, HEADER_BYTES};
use crate::error::{EngineError, Result};
use crate::types::{BatchSeq, ColumnType};

/// A parsed batch: header fields plus one typed view per column.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch {
    pub seq: BatchSeq,
    pub row_count: u32,
    pub columns: Vec<ParsedColumn>,
}

/// One column of a parsed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedColumn {
    /// Wire type from the descriptor. `TimestampMs` keeps its own tag here
    /// even though its values decode as f64.
    pub column_type: ColumnType,
    pub values: ColumnValues,
}

/// Typed, aligned copies of a column's data block.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    F64(Vec<f64>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    Bool(Vec<u8>),
    Utf8 {
        /// `row_count + 1` batch-relative byte offsets, `offsets[0] == 0`
        offsets: Vec<u32>,
        bytes: Vec<u8>,
    },
    ListUtf8 {
        /// `row_count + 1` batch-relative item indices
        row_offsets: Vec<u32>,
        /// `total_items + 1` batch-relative byte offsets
        item_offsets: Vec<u32>,
        bytes: Vec<u8>,
    },
}

impl ColumnValues {
    /// The string at `row`, for utf8 columns.
    pub fn utf8_str(&self, row: usize) -> Option<&str> {
        match self {
            ColumnValues::Utf8 { offsets, bytes } => {
                let start = *offsets.get(row)? as usize;
                let end = *offsets.get(row + 1)? as usize;
                std::str::from_utf8(bytes.get(start..end)?).ok()
            }
            _ => None,
        }
    }

    /// The list of strings at `row`, for list_utf8 columns.
    pub fn list_items(&self, row: usize) -> Option<Vec<&str>> {
        match self {
            ColumnValues::ListUtf8 {
                row_offsets,
                item_offsets,
                bytes,
            } => {
                let first = *row_offsets.get(row)? as usize;
                let last = *row_offsets.get(row + 1)? as usize;
                let mut items = Vec::with_capacity(last.saturating_sub(first));
                for i in first..last {
                    let start = *item_offsets.get(i)? as usize;
                    let end = *item_offsets.get(i + 1)? as usize;
                    items.push(std::str::from_utf8(bytes.get(start..end)?).ok()?);
                }
                Some(items)
            }
            _ => None,
        }
    }
}

/// Little-endian cursor over a byte slice. Reads never panic; running out of
/// input reports how much was needed.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, column_index: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(EngineError::Truncated {
                column_index,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self, column_index: usize) -> Result<u32> {
        let b = self.take(4, column_index)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn read_u32s(block: &[u8], count: usize) -> Vec<u32> {
    block[..count * 4]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Parse a wire buffer into typed column views.
pub fn parse_batch(buf: &[u8]) -> Result<ParsedBatch> {
    let mut header = Reader::new(buf);
    let magic = header.u32(0)?;
    if magic != BATCH_MAGIC {
        return Err(EngineError::InvalidMagic(magic));
    }
    let seq = BatchSeq(header.u32(0)?);
    let row_count = header.u32(0)?;
    let col_count = header.u32(0)? as usize;

    // Descriptors: (type, byteLen) per column.
    let mut descriptors = Vec::with_capacity(col_count);
    for i in 0..col_count {
        let tag = header.u32(i)?;
        let byte_len = header.u32(i)? as usize;
        let column_type = ColumnType::from_tag(tag).ok_or(EngineError::UnknownTypeTag {
            tag,
            column_index: i,
        })?;
        descriptors.push((column_type, byte_len));
    }

    // Data blocks follow in descriptor order.
    let data_base = HEADER_BYTES + col_count * COL_DESC_BYTES;
    let mut offset = data_base;
    let mut columns = Vec::with_capacity(col_count);
    for (i, &(column_type, byte_len)) in descriptors.iter().enumerate() {
        if offset + byte_len > buf.len() {
            return Err(EngineError::Truncated {
                column_index: i,
                needed: byte_len,
                available: buf.len().saturating_sub(offset),
            });
        }
        let block = &buf[offset..offset + byte_len];
        offset += byte_len;
        columns.push(ParsedColumn {
            column_type,
            values: parse_block(column_type, block, row_count as usize, i)?,
        });
    }

    Ok(ParsedBatch {
        seq,
        row_count,
        columns,
    })
}

fn parse_block(
    column_type: ColumnType,
    block: &[u8],
    rows: usize,
    column_index: usize,
) -> Result<ColumnValues> {
    let need = |needed: usize| -> Result<()> {
        if block.len() < needed {
            Err(EngineError::Truncated {
                column_index,
                needed,
                available: block.len(),
            })
        } else {
            Ok(())
        }
    };

    match column_type {
        ColumnType::F64 | ColumnType::TimestampMs => {
            need(rows * 8)?;
            let values = block[..rows * 8]
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            Ok(ColumnValues::F64(values))
        }
        ColumnType::I32 => {
            need(rows * 4)?;
            let values = block[..rows * 4]
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok(ColumnValues::I32(values))
        }
        ColumnType::U32 => {
            need(rows * 4)?;
            Ok(ColumnValues::U32(read_u32s(block, rows)))
        }
        ColumnType::Bool => {
            need(rows)?;
            Ok(ColumnValues::Bool(block[..rows].to_vec()))
        }
        ColumnType::Utf8 => {
            let offsets_len = (rows + 1) * 4;
            need(offsets_len)?;
            let offsets = read_u32s(block, rows + 1);
            let content = &block[offsets_len..];
            let terminal = offsets[rows] as usize;
            if terminal > content.len() {
                return Err(EngineError::Truncated {
                    column_index,
                    needed: offsets_len + terminal,
                    available: block.len(),
                });
            }
            Ok(ColumnValues::Utf8 {
                offsets,
                bytes: content[..terminal].to_vec(),
            })
        }
        ColumnType::ListUtf8 => {
            let mut cursor = Reader::new(block);
            let total_items = cursor.u32(column_index)? as usize;
            let row_block = cursor.take((rows + 1) * 4, column_index)?;
            let item_block = cursor.take((total_items + 1) * 4, column_index)?;
            let row_offsets = read_u32s(row_block, rows + 1);
            let item_offsets = read_u32s(item_block, total_items + 1);
            let content = cursor.take(cursor.remaining(), column_index)?;
            let terminal = item_offsets[total_items] as usize;
            if terminal > content.len() {
                return Err(EngineError::Truncated {
                    column_index,
                    needed: block.len() - content.len() + terminal,
                    available: block.len(),
                });
            }
            Ok(ColumnValues::ListUtf8 {
                row_offsets,
                item_offsets,
                bytes: content[..terminal].to_vec(),
            })
        }
    }
}
