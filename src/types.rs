//! Core data types for the gridstream engine
//!
//! This module contains the fundamental data structures shared by the codec,
//! the column store, and the orchestrator.
//!
//! # Main Types
//!
//! - [`ColumnType`] - Closed set of supported column types with their wire tags
//! - [`ColumnSchema`] - Per-column configuration supplied by the consumer
//! - [`ResolvedColumn`] - Schema entry plus the computed layout width
//! - [`ViewportLayout`] - Row/column geometry derived from schema and viewport
//!
//! # Branded Scalars
//!
//! Row indices, pixel sizes, millisecond durations, batch sequence numbers and
//! pool slots are all unsigned integers on the wire, but semantically distinct.
//! Each gets a newtype ([`RowIndex`], [`PixelSize`], [`Millis`], [`BatchSeq`],
//! [`PoolSlot`]) so cross-category assignment is a compile error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizontal padding applied to both sides of a cell when deriving a column
/// width from its content budget, in pixels.
pub const CELL_H_PADDING: u32 = 16;

/// Rows rendered above and below the visible viewport to absorb fast scrolling.
pub const DEFAULT_OVERSCAN_ROWS: u32 = 3;

// ==================== Branded scalars ====================

/// Absolute row position within the store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RowIndex(pub u32);

impl RowIndex {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Row position `count` rows below this one, saturating at `u32::MAX`.
    #[inline]
    pub fn advance(self, count: u32) -> RowIndex {
        RowIndex(self.0.saturating_add(count))
    }
}

impl fmt::Debug for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowIndex({})", self.0)
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A size or coordinate measured in whole pixels.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PixelSize(pub u32);

impl PixelSize {
    pub const ZERO: PixelSize = PixelSize(0);

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// A duration in whole milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Millis(pub u32);

impl Millis {
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Debug for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Monotonic sequence number. Separate counters are kept for ingest commands
/// and window emissions; both use this type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BatchSeq(pub u32);

impl BatchSeq {
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The next sequence number. Counters are 32-bit and not expected to wrap
    /// within a store's lifetime.
    #[inline]
    pub fn next(self) -> BatchSeq {
        BatchSeq(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for BatchSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchSeq({})", self.0)
    }
}

impl fmt::Display for BatchSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a recycled render slot in a consumer-side element pool. Pool
/// bookkeeping itself lives in the consumer; the engine only brands the index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PoolSlot(pub u32);

impl PoolSlot {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PoolSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolSlot({})", self.0)
    }
}

// ==================== Column types ====================

/// The closed set of column types understood by the codec and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// IEEE-754 double precision float
    #[default]
    F64,
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
    /// Boolean stored as one byte (0 or 1)
    Bool,
    /// Epoch milliseconds, stored as f64
    TimestampMs,
    /// Variable-length UTF-8 string
    Utf8,
    /// Nested list of UTF-8 strings
    ListUtf8,
}

impl ColumnType {
    /// The numeric tag identifying this type on the wire.
    pub fn tag(self) -> u32 {
        match self {
            ColumnType::F64 => 0,
            ColumnType::I32 => 1,
            ColumnType::U32 => 2,
            ColumnType::Bool => 3,
            ColumnType::TimestampMs => 4,
            ColumnType::Utf8 => 5,
            ColumnType::ListUtf8 => 6,
        }
    }

    /// Inverse of [`tag`](Self::tag). Returns `None` for unknown tags.
    pub fn from_tag(tag: u32) -> Option<ColumnType> {
        Some(match tag {
            0 => ColumnType::F64,
            1 => ColumnType::I32,
            2 => ColumnType::U32,
            3 => ColumnType::Bool,
            4 => ColumnType::TimestampMs,
            5 => ColumnType::Utf8,
            6 => ColumnType::ListUtf8,
            _ => return None,
        })
    }

    /// Element size in bytes for fixed-width types, `None` for the
    /// variable-length ones.
    pub fn fixed_elem_size(self) -> Option<usize> {
        match self {
            ColumnType::F64 | ColumnType::TimestampMs => Some(8),
            ColumnType::I32 | ColumnType::U32 => Some(4),
            ColumnType::Bool => Some(1),
            ColumnType::Utf8 | ColumnType::ListUtf8 => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::F64 => "f64",
            ColumnType::I32 => "i32",
            ColumnType::U32 => "u32",
            ColumnType::Bool => "bool",
            ColumnType::TimestampMs => "timestamp_ms",
            ColumnType::Utf8 => "utf8",
            ColumnType::ListUtf8 => "list_utf8",
        };
        f.write_str(name)
    }
}

// ==================== Schema & layout ====================

/// Consumer-supplied configuration for a single column.
///
/// `name` is opaque to the codec; `max_content_chars` and `fixed_width` feed
/// the layout engine only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Display name, also the record key during encoding
    pub name: String,
    /// Storage type
    pub column_type: ColumnType,
    /// Expected content budget in characters, for width estimation
    pub max_content_chars: u32,
    /// Explicit width override; wins over the estimated width
    #[serde(default)]
    pub fixed_width: Option<PixelSize>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, max_content_chars: u32) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_content_chars,
            fixed_width: None,
        }
    }
}

/// A schema entry with its layout width resolved and its position fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    pub schema: ColumnSchema,
    pub computed_width: PixelSize,
    pub column_index: u32,
}

/// Resolve every schema entry against a character width hint.
///
/// `computed_width = fixed_width ?? max_content_chars * char_width_hint + 2 * CELL_H_PADDING`
pub fn resolve_columns(schema: &[ColumnSchema], char_width_hint: u32) -> Vec<ResolvedColumn> {
    schema
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let computed_width = col.fixed_width.unwrap_or(PixelSize(
                col.max_content_chars * char_width_hint + 2 * CELL_H_PADDING,
            ));
            ResolvedColumn {
                schema: col.clone(),
                computed_width,
                column_index: i as u32,
            }
        })
        .collect()
}

/// Row/column geometry the renderer needs to place a window.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportLayout {
    pub columns: Vec<ResolvedColumn>,
    pub row_height: PixelSize,
    pub total_rows: u32,
    pub total_height: PixelSize,
    /// Rows needed to cover the viewport: `ceil(viewport_height / row_height) + 1`
    pub viewport_rows: u32,
}

impl ViewportLayout {
    /// Compute the layout for the current store size and viewport.
    ///
    /// A zero `row_height` is treated as one pixel so the division stays
    /// defined; the consumer normally supplies a measured pitch instead.
    pub fn compute(
        columns: Vec<ResolvedColumn>,
        row_height: PixelSize,
        total_rows: u32,
        viewport_height: PixelSize,
    ) -> Self {
        let row_px = row_height.get().max(1);
        let viewport_rows = viewport_height.get().div_ceil(row_px) + 1;
        let total_height = PixelSize(total_rows.saturating_mul(row_px));
        Self {
            columns,
            row_height: PixelSize(row_px),
            total_rows,
            total_height,
            viewport_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for ty in [
            ColumnType::F64,
            ColumnType::I32,
            ColumnType::U32,
            ColumnType::Bool,
            ColumnType::TimestampMs,
            ColumnType::Utf8,
            ColumnType::ListUtf8,
        ] {
            assert_eq!(ColumnType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ColumnType::from_tag(7), None);
        assert_eq!(ColumnType::from_tag(u32::MAX), None);
    }

    #[test]
    fn test_fixed_elem_sizes() {
        assert_eq!(ColumnType::F64.fixed_elem_size(), Some(8));
        assert_eq!(ColumnType::TimestampMs.fixed_elem_size(), Some(8));
        assert_eq!(ColumnType::I32.fixed_elem_size(), Some(4));
        assert_eq!(ColumnType::Bool.fixed_elem_size(), Some(1));
        assert_eq!(ColumnType::Utf8.fixed_elem_size(), None);
        assert_eq!(ColumnType::ListUtf8.fixed_elem_size(), None);
    }

    #[test]
    fn test_resolve_columns_estimated_width() {
        let schema = vec![ColumnSchema::new("x", ColumnType::F64, 8)];
        let resolved = resolve_columns(&schema, 9);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].column_index, 0);
        // 8 chars * 9px + 2 * 16px padding
        assert_eq!(resolved[0].computed_width, PixelSize(8 * 9 + 32));
    }

    #[test]
    fn test_resolve_columns_fixed_width_wins() {
        let mut col = ColumnSchema::new("id", ColumnType::U32, 20);
        col.fixed_width = Some(PixelSize(90));
        let resolved = resolve_columns(&[col], 9);
        assert_eq!(resolved[0].computed_width, PixelSize(90));
    }

    #[test]
    fn test_viewport_rows_rounds_up() {
        let layout = ViewportLayout::compute(Vec::new(), PixelSize(28), 100, PixelSize(600));
        // ceil(600 / 28) = 22, plus one partial row
        assert_eq!(layout.viewport_rows, 23);
        assert_eq!(layout.total_height, PixelSize(2800));
    }

    #[test]
    fn test_viewport_exact_fit_still_adds_one() {
        let layout = ViewportLayout::compute(Vec::new(), PixelSize(30), 10, PixelSize(600));
        assert_eq!(layout.viewport_rows, 21);
    }

    #[test]
    fn test_zero_row_height_is_sanitised() {
        let layout = ViewportLayout::compute(Vec::new(), PixelSize(0), 5, PixelSize(100));
        assert_eq!(layout.row_height, PixelSize(1));
        assert_eq!(layout.viewport_rows, 101);
    }

    #[test]
    fn test_batch_seq_next() {
        assert_eq!(BatchSeq(0).next(), BatchSeq(1));
        assert_eq!(BatchSeq(41).next().get(), 42);
    }

    #[test]
    fn test_row_index_advance_saturates() {
        assert_eq!(RowIndex(10).advance(5), RowIndex(15));
        assert_eq!(RowIndex(u32::MAX).advance(1), RowIndex(u32::MAX));
    }
}
