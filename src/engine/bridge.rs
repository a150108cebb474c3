//! Thread boundary between the ingest worker and the consumer side.
//!
//! `EngineBridge` is the consumer-side handle: it owns the command sender and
//! the event receiver. The worker thread owns the opposite ends. Both
//! directions are bounded FIFO channels; byte buffers cross by move, after
//! which the sender has no view of them.

use crate::backpressure::Strategy;
use crate::config::{CMD_CHANNEL_CAPACITY, EVT_CHANNEL_CAPACITY};
use crate::types::{BatchSeq, ColumnSchema, Millis, PixelSize, RowIndex, ViewportLayout};
use crate::window::DataWindow;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Commands sent from the consumer side to the worker.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Create the column store and initial layout.
    Init {
        schema: Vec<ColumnSchema>,
        char_width_hint: u32,
        row_height_hint: PixelSize,
        viewport_height: PixelSize,
    },
    /// One encoded record batch; the buffer is surrendered to the worker.
    Ingest { buffer: Vec<u8>, seq: BatchSeq },
    /// Set the row range the renderer currently wants.
    SetWindow { start_row: RowIndex, row_count: u32 },
    /// The viewport height changed; recompute geometry.
    ResizeViewport { height: PixelSize },
    /// Render-latency feedback for one presented frame. `seq` echoes the last
    /// observed window and is telemetry only.
    FrameAck { render_ms: Millis, seq: BatchSeq },
    /// Controlled shutdown; the worker stops without emitting further events.
    Terminate,
}

/// Events emitted by the worker.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Initial layout, emitted once per `Init`.
    LayoutReady { layout: ViewportLayout },
    /// A packed row window; the buffer is surrendered to the consumer.
    WindowUpdate { window: DataWindow },
    /// The backpressure strategy changed.
    Backpressure {
        strategy: Strategy,
        queue_depth: usize,
        avg_render_ms: f64,
    },
    /// The store grew.
    TotalRowsUpdated { total_rows: u32 },
    /// An ingest command failed. `fatal` marks stream-poisoning failures
    /// (integrity violations) as opposed to batch-local ones.
    IngestError {
        seq: BatchSeq,
        message: String,
        fatal: bool,
    },
    /// Acknowledges one ingest command; gates the pump. Every ingest receives
    /// exactly one, error or not.
    IngestAck { seq: BatchSeq },
}

/// Consumer-side handle for communicating with the worker thread.
pub struct EngineBridge {
    pub cmd_tx: Sender<EngineCommand>,
    pub evt_rx: Receiver<EngineEvent>,
}

impl EngineBridge {
    /// Create a bridge pair: `(bridge_for_consumer, cmd_rx, evt_tx)`.
    ///
    /// The worker thread owns `cmd_rx` and `evt_tx`.
    pub fn new() -> (Self, Receiver<EngineCommand>, Sender<EngineEvent>) {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (evt_tx, evt_rx) = bounded(EVT_CHANNEL_CAPACITY);
        (Self { cmd_tx, evt_rx }, cmd_rx, evt_tx)
    }

    /// Drain all pending events without blocking.
    pub fn drain(&self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.evt_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Try to receive a single event without blocking.
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.evt_rx.try_recv().ok()
    }

    /// Send a command; returns `false` if the worker is gone.
    pub fn send_command(&self, cmd: EngineCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }
}
