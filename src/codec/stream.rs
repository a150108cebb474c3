//! Streaming encode adapter
//!
//! Wraps a lazy, fallible sequence of row batches and yields encoded wire
//! buffers in order, stamping each with a monotonic sequence number starting
//! at 0. Producer errors pass through to the sink as
//! [`EngineError::Source`](crate::error::EngineError::Source).

use crate::codec::encoder::{encode_batch, Record};
use crate::error::{EngineError, Result};
use crate::types::{BatchSeq, ColumnSchema};

/// Iterator adapter: row batches in, encoded buffers out.
pub struct BatchEncoder<I> {
    schema: Vec<ColumnSchema>,
    source: I,
    next_seq: BatchSeq,
}

impl<I> BatchEncoder<I> {
    pub fn new(schema: Vec<ColumnSchema>, source: I) -> Self {
        Self {
            schema,
            source,
            next_seq: BatchSeq(0),
        }
    }

    /// The seq the next yielded buffer will carry.
    pub fn next_seq(&self) -> BatchSeq {
        self.next_seq
    }
}

impl<I, E> Iterator for BatchEncoder<I>
where
    I: Iterator<Item = std::result::Result<Vec<Record>, E>>,
    E: std::fmt::Display,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.source.next()? {
            Ok(rows) => {
                let seq = self.next_seq;
                self.next_seq = seq.next();
                Some(Ok(encode_batch(&self.schema, &rows, seq)))
            }
            Err(e) => Some(Err(EngineError::Source(e.to_string()))),
        }
    }
}
