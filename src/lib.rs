//! # GridStream-RS: Off-thread Columnar Ingest Engine
//!
//! A data pipeline that ingests row-oriented record batches on a worker
//! thread, stores them in a growable columnar form, and serves contiguous row
//! *windows* into a renderer as single transferable byte buffers.
//!
//! ## Architecture
//!
//! - **Codec**: a compact little-endian wire format for fixed-width,
//!   variable-length UTF-8 and nested UTF-8 list columns
//! - **Store**: append-only typed columns that preserve the wire layout so
//!   windows slice out without transcoding
//! - **Engine**: a worker thread and a main-side pump joined by crossbeam
//!   channels, with one ingest batch in flight at a time
//! - **Backpressure**: render-latency feedback moves the worker between
//!   NOMINAL, BUFFER and SHED strategies
//! - **State**: an immutable-snapshot store on the consumer side with
//!   synchronous listener and slice-observer fan-out
//!
//! ## Example
//!
//! ```ignore
//! use gridstream_rs::{
//!     codec::BatchEncoder,
//!     config::EngineConfig,
//!     engine::spawn_engine,
//!     types::{ColumnSchema, ColumnType, PixelSize},
//! };
//!
//! let schema = vec![
//!     ColumnSchema::new("ts", ColumnType::TimestampMs, 13),
//!     ColumnSchema::new("name", ColumnType::Utf8, 32),
//! ];
//!
//! let (mut engine, worker) = spawn_engine(EngineConfig::default());
//! engine.init(schema.clone(), 9, PixelSize(28), PixelSize(720));
//!
//! // Encode row batches lazily and pump them with one batch in flight.
//! let encoder = BatchEncoder::new(schema, record_batches());
//! engine.run_pump(encoder)?;
//!
//! // Per rendered frame: drain events, report latency, follow the scroll.
//! engine.poll_events();
//! engine.frame_rendered(frame_ms);
//! engine.on_scroll(scroll_top);
//!
//! engine.terminate();
//! worker.join().unwrap();
//! # Ok::<(), gridstream_rs::error::EngineError>(())
//! ```

pub mod backpressure;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod store;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use backpressure::{BackpressureController, Strategy};
pub use codec::{encode_batch, parse_batch, BatchEncoder, CellValue, Record};
pub use config::EngineConfig;
pub use engine::{
    spawn_engine, EngineBridge, EngineCommand, EngineEvent, EngineHandle, EngineWorker,
};
pub use error::{EngineError, Result};
pub use state::{StateStore, StoreState, StoreStatus};
pub use store::ColumnStore;
pub use types::{
    BatchSeq, ColumnSchema, ColumnType, Millis, PixelSize, PoolSlot, ResolvedColumn, RowIndex,
    ViewportLayout,
};
pub use window::{pack_window, DataWindow};
