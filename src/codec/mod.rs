//! Record-batch wire codec
//!
//! A compact little-endian columnar format carrying one ingest payload per
//! buffer. The same format frames both ingest batches and the row windows the
//! engine emits back to the renderer, so store slices can be re-emitted
//! without transcoding.
//!
//! # Wire layout
//!
//! ```text
//! header (16 bytes):
//!    0  u32 magic      = 0xAC1DC0DE
//!    4  u32 seq
//!    8  u32 rowCount
//!   12  u32 colCount
//! column descriptors (colCount x 8 bytes):
//!   +0  u32 typeTag
//!   +4  u32 byteLen of the column's data block
//! column data blocks, in schema order, concatenated
//! ```
//!
//! See [`encoder`] for the per-type block layouts and [`parser`] for the
//! decoding rules.

pub mod encoder;
pub mod parser;
pub mod stream;

pub use encoder::{encode_batch, CellValue, Record};
pub use parser::{parse_batch, ColumnValues, ParsedBatch, ParsedColumn};
pub use stream::BatchEncoder;

/// Opens every valid wire buffer.
pub const BATCH_MAGIC: u32 = 0xAC1D_C0DE;

/// Fixed header size in bytes.
pub const HEADER_BYTES: usize = 16;

/// Size of one column descriptor in bytes.
pub const COL_DESC_BYTES: usize = 8;
