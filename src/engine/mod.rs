//! Ingest orchestrator
//!
//! Two cooperating endpoints connected by bounded FIFO channels:
//!
//! - **Worker side** ([`worker::EngineWorker`]): owns the column store, runs
//!   on a dedicated thread, commits one queued batch per scheduling pass and
//!   emits events.
//! - **Main side** ([`EngineHandle`]): owns the consumer [`StateStore`], the
//!   ACK accounting and the scroll/resize/frame plumbing. Its pump bounds
//!   in-flight ingest to exactly one batch.
//!
//! Byte buffers cross the boundary by move; after a send the sender has no
//! way to touch the bytes again.

pub mod bridge;
mod pump;
pub mod worker;

pub use bridge::{EngineBridge, EngineCommand, EngineEvent};
pub use worker::EngineWorker;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::state::{StateStore, StoreState};
use crate::types::{BatchSeq, ColumnSchema, Millis, PixelSize, RowIndex};
use pump::IngestPump;
#[cfg(test)]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Spawn the worker thread and return the consumer-side handle.
pub fn spawn_engine(config: EngineConfig) -> (EngineHandle, JoinHandle<()>) {
    let (bridge, cmd_rx, evt_tx) = EngineBridge::new();
    let running = Arc::new(AtomicBool::new(true));

    let worker_config = config.clone();
    let worker_running = Arc::clone(&running);
    let join = std::thread::spawn(move || {
        EngineWorker::new(worker_config, cmd_rx, evt_tx, worker_running).run();
    });

    (EngineHandle::new(bridge, config), join)
}

/// Main-side facade: command sender, event receiver, ACK accounting and the
/// consumer state store.
pub struct EngineHandle {
    bridge: EngineBridge,
    config: EngineConfig,
    store: StateStore,
    abort: Arc<AtomicBool>,
    next_ingest_seq: BatchSeq,
    /// At most one ingest is registered for acknowledgement at any instant.
    pending_ack: Option<BatchSeq>,
    terminated: bool,
}

impl EngineHandle {
    pub fn new(bridge: EngineBridge, config: EngineConfig) -> Self {
        Self {
            bridge,
            config,
            store: StateStore::new(),
            abort: Arc::new(AtomicBool::new(false)),
            next_ingest_seq: BatchSeq(0),
            pending_ack: None,
            terminated: false,
        }
    }

    /// The consumer state store (subscriptions, slices, snapshots).
    pub fn store(&mut self) -> &mut StateStore {
        &mut self.store
    }

    /// Current immutable state snapshot.
    pub fn state(&self) -> Arc<StoreState> {
        self.store.state()
    }

    /// Abort signal for the pump; set it from any thread to cancel ingest.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Initialise the worker's column store and layout.
    pub fn init(
        &mut self,
        schema: Vec<ColumnSchema>,
        char_width_hint: u32,
        row_height_hint: PixelSize,
        viewport_height: PixelSize,
    ) -> bool {
        self.bridge.send_command(EngineCommand::Init {
            schema,
            char_width_hint,
            row_height_hint,
            viewport_height,
        })
    }

    /// Drain pending events into the state store. Call once per frame.
    pub fn poll_events(&mut self) {
        while let Some(event) = self.bridge.try_recv() {
            self.store.dispatch(event);
        }
    }

    /// Drive a batch source to exhaustion with in-flight = 1.
    ///
    /// Returns `Ok` on completion (status `complete`) or controlled
    /// termination; `Err(Aborted)` when the abort flag fires;
    /// `Err(TransportCrash)` when the worker vanishes (status `error`).
    pub fn run_pump<I>(&mut self, source: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Vec<u8>>>,
    {
        let mut pump = IngestPump {
            cmd_tx: &self.bridge.cmd_tx,
            evt_rx: &self.bridge.evt_rx,
            store: &mut self.store,
            abort: &self.abort,
            next_seq: &mut self.next_ingest_seq,
            pending_ack: &mut self.pending_ack,
            terminated: &self.terminated,
        };
        pump.run(source)
    }

    /// Translate a scroll position into a window request.
    ///
    /// `start_row = floor(scroll_top / effective_row_height)` where the
    /// consumer-measured pitch overrides the layout row height when set;
    /// `row_count = viewport_rows + 2 * overscan`.
    pub fn on_scroll(&mut self, scroll_top: PixelSize) -> bool {
        let state = self.store.state();
        let Some(layout) = state.layout.as_ref() else {
            return false;
        };
        let effective_row_height = if state.pitch.get() > 0 {
            state.pitch
        } else {
            layout.row_height
        };
        let start_row = RowIndex(scroll_top.get() / effective_row_height.get().max(1));
        let row_count = layout.viewport_rows + 2 * self.config.overscan_rows;
        self.bridge.send_command(EngineCommand::SetWindow {
            start_row,
            row_count,
        })
    }

    /// Report the viewport height after a resize.
    pub fn resize_viewport(&mut self, height: PixelSize) -> bool {
        self.bridge
            .send_command(EngineCommand::ResizeViewport { height })
    }

    /// Report one rendered frame's latency. The attached seq echoes the last
    /// observed window for telemetry correlation.
    pub fn frame_rendered(&mut self, render_ms: Millis) -> bool {
        let seq = self
            .store
            .state()
            .window
            .as_ref()
            .map(|w| w.seq)
            .unwrap_or_default();
        self.bridge
            .send_command(EngineCommand::FrameAck { render_ms, seq })
    }

    /// Controlled shutdown: the worker stops emitting and exits; any
    /// registered ACK resolves rather than rejects.
    pub fn terminate(&mut self) {
        self.terminated = true;
        self.pending_ack = None;
        let _ = self.bridge.send_command(EngineCommand::Terminate);
        tracing::info!("terminate sent to worker");
    }
}
