//! Window packer
//!
//! Produces one contiguous wire-format buffer for a contiguous row range.
//! The output is framed exactly like an ingest batch (same header, same
//! descriptors), so the consumer parses windows with the ordinary batch
//! parser. The buffer is built fresh per request and ownership moves to the
//! caller; the store never retains a window.

use crate::codec::{BATCH_MAGIC, COL_DESC_BYTES, HEADER_BYTES};
use crate::store::ColumnStore;
use crate::types::{BatchSeq, RowIndex, ViewportLayout};

/// A packed row window, ready for ownership transfer to the renderer.
#[derive(Debug, Clone)]
pub struct DataWindow {
    /// Emission sequence number, strictly monotonic per store instance
    pub seq: BatchSeq,
    /// First row in the window after clamping
    pub start_row: RowIndex,
    /// Rows actually carried (clamped to the store suffix)
    pub row_count: u32,
    /// Layout in force when the window was packed
    pub layout: ViewportLayout,
    /// Wire-format payload: exactly `row_count` rows of every column
    pub buffer: Vec<u8>,
}

/// Slice `[start_row, start_row + row_count)` out of every column and frame
/// the result as one wire buffer.
///
/// `start_row` is clamped to the store's row total and `row_count` to the
/// remaining suffix, so the request never fails — an out-of-range window is
/// simply empty.
pub fn pack_window(
    store: &ColumnStore,
    layout: &ViewportLayout,
    start_row: RowIndex,
    row_count: u32,
    seq: BatchSeq,
) -> DataWindow {
    let (start, actual) = store.clamp_range(start_row, row_count);

    let blocks: Vec<Vec<u8>> = store
        .columns()
        .iter()
        .map(|col| col.copy_slice(start.0, actual))
        .collect();

    let data_len: usize = blocks.iter().map(Vec::len).sum();
    let mut buffer =
        Vec::with_capacity(HEADER_BYTES + blocks.len() * COL_DESC_BYTES + data_len);
    buffer.extend_from_slice(&BATCH_MAGIC.to_le_bytes());
    buffer.extend_from_slice(&seq.get().to_le_bytes());
    buffer.extend_from_slice(&actual.to_le_bytes());
    buffer.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    for (col, block) in store.columns().iter().zip(&blocks) {
        buffer.extend_from_slice(&col.column_type().tag().to_le_bytes());
        buffer.extend_from_slice(&(block.len() as u32).to_le_bytes());
    }
    for block in &blocks {
        buffer.extend_from_slice(block);
    }

    DataWindow {
        seq,
        start_row: start,
        row_count: actual,
        layout: layout.clone(),
        buffer,
    }
}
