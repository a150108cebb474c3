//! Test data builders for schemas, records and wire buffers

use gridstream_rs::{encode_batch, BatchSeq, CellValue, ColumnSchema, ColumnType, PixelSize, Record};

/// Builder for creating test ColumnSchemas
pub struct ColumnBuilder {
    name: String,
    column_type: ColumnType,
    max_content_chars: u32,
    fixed_width: Option<PixelSize>,
}

impl ColumnBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::F64,
            max_content_chars: 8,
            fixed_width: None,
        }
    }

    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn max_content_chars(mut self, chars: u32) -> Self {
        self.max_content_chars = chars;
        self
    }

    pub fn fixed_width(mut self, width: PixelSize) -> Self {
        self.fixed_width = Some(width);
        self
    }

    pub fn build(self) -> ColumnSchema {
        ColumnSchema {
            name: self.name,
            column_type: self.column_type,
            max_content_chars: self.max_content_chars,
            fixed_width: self.fixed_width,
        }
    }
}

/// Build a record from name/value pairs.
pub fn record(pairs: &[(&str, CellValue)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Encode a single-column f64 batch.
pub fn f64_batch(name: &str, values: &[f64], seq: u32) -> Vec<u8> {
    let schema = vec![ColumnBuilder::new(name).build()];
    let rows: Vec<Record> = values
        .iter()
        .map(|&v| record(&[(name, CellValue::Number(v))]))
        .collect();
    encode_batch(&schema, &rows, BatchSeq(seq))
}

/// Hand-assemble a two-column list_utf8 batch whose second column declares
/// more items in its row offsets than its item index carries — the shape a
/// buggy encoder produces when parallel list columns disagree on per-row item
/// counts. Parses fine; fails the store's post-commit integrity check.
pub fn corrupt_parallel_list_batch(seq: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    let push = |buf: &mut Vec<u8>, v: u32| buf.extend_from_slice(&v.to_le_bytes());

    // Column 0 "organism_ids": rows [["a","b"], ["c"]] — consistent.
    let mut ids = Vec::new();
    push(&mut ids, 3); // totalItems
    for v in [0u32, 2, 3] {
        push(&mut ids, v); // rowOffsets
    }
    for v in [0u32, 1, 2, 3] {
        push(&mut ids, v); // itemOffsets
    }
    ids.extend_from_slice(b"abc");

    // Column 1 "organism_names": rowOffsets still claim items [2, 1] per row
    // (terminal 3) but the item index only carries two entries.
    let mut names = Vec::new();
    push(&mut names, 2); // totalItems
    for v in [0u32, 2, 3] {
        push(&mut names, v); // rowOffsets, terminal exceeds totalItems
    }
    for v in [0u32, 1, 2] {
        push(&mut names, v); // itemOffsets
    }
    names.extend_from_slice(b"ES");

    push(&mut buf, 0xAC1D_C0DE); // magic
    push(&mut buf, seq);
    push(&mut buf, 2); // rowCount
    push(&mut buf, 2); // colCount
    push(&mut buf, ColumnType::ListUtf8.tag());
    push(&mut buf, ids.len() as u32);
    push(&mut buf, ColumnType::ListUtf8.tag());
    push(&mut buf, names.len() as u32);
    buf.extend_from_slice(&ids);
    buf.extend_from_slice(&names);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_builder() {
        let col = ColumnBuilder::new("name")
            .column_type(ColumnType::Utf8)
            .max_content_chars(32)
            .fixed_width(PixelSize(120))
            .build();

        assert_eq!(col.name, "name");
        assert_eq!(col.column_type, ColumnType::Utf8);
        assert_eq!(col.max_content_chars, 32);
        assert_eq!(col.fixed_width, Some(PixelSize(120)));
    }

    #[test]
    fn test_corrupt_batch_still_parses() {
        let buf = corrupt_parallel_list_batch(0);
        let parsed = gridstream_rs::parse_batch(&buf).unwrap();
        assert_eq!(parsed.row_count, 2);
        assert_eq!(parsed.columns.len(), 2);
    }
}
