//! Ingest worker endpoint
//!
//! Runs on a dedicated thread and owns the column store outright; nothing on
//! the consumer side can reach it except through commands. The loop drains
//! commands, commits at most one queued batch per pass so a burst of ingests
//! never monopolises the endpoint, and emits one `WindowUpdate` for the
//! currently requested window once the queue is empty.
//!
//! # Responsibilities
//!
//! - **Command processing**: responds to init, ingest, window, resize,
//!   frame-latency and terminate commands
//! - **Batch commit**: parse, schema pre-check, append, integrity post-check
//! - **Backpressure**: admits ingests under SHED by evicting the oldest
//!   queued command once the queue is full
//! - **Acknowledgement**: every ingest command is ACKed exactly once,
//!   whether it committed, failed, or was shed

use crate::backpressure::BackpressureController;
use crate::codec::parse_batch;
use crate::config::EngineConfig;
use crate::engine::bridge::{EngineCommand, EngineEvent};
use crate::error::EngineError;
use crate::store::ColumnStore;
use crate::types::{
    resolve_columns, BatchSeq, ColumnSchema, PixelSize, RowIndex, ViewportLayout,
};
use crate::window::pack_window;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the loop parks waiting for a command when fully idle.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// An ingest command waiting for its scheduling quantum.
struct QueuedIngest {
    seq: BatchSeq,
    buffer: Vec<u8>,
}

/// Store plus the geometry needed to serve windows, created by `Init`.
struct IngestState {
    store: ColumnStore,
    char_width_hint: u32,
    row_height: PixelSize,
    viewport_height: PixelSize,
    layout: ViewportLayout,
    /// Row range the renderer currently wants
    requested: Option<(RowIndex, u32)>,
}

impl IngestState {
    fn new(
        schema: Vec<ColumnSchema>,
        char_width_hint: u32,
        row_height: PixelSize,
        viewport_height: PixelSize,
    ) -> Self {
        let store = ColumnStore::new(schema);
        let layout = ViewportLayout::compute(
            resolve_columns(store.schema(), char_width_hint),
            row_height,
            store.total_rows(),
            viewport_height,
        );
        Self {
            store,
            char_width_hint,
            row_height,
            viewport_height,
            layout,
            requested: None,
        }
    }

    fn recompute_layout(&mut self) {
        self.layout = ViewportLayout::compute(
            resolve_columns(self.store.schema(), self.char_width_hint),
            self.row_height,
            self.store.total_rows(),
            self.viewport_height,
        );
    }
}

/// The worker that owns the column store and drains the ingest queue.
pub struct EngineWorker {
    config: EngineConfig,
    cmd_rx: Receiver<EngineCommand>,
    evt_tx: Sender<EngineEvent>,
    running: Arc<AtomicBool>,
    backpressure: BackpressureController,
    pending: VecDeque<QueuedIngest>,
    state: Option<IngestState>,
    /// Next window emission seq; strictly monotonic for the worker's lifetime
    next_window_seq: BatchSeq,
    /// A commit or window request happened since the last emission
    window_dirty: bool,
    /// The store failed its integrity check; later ingests are ACKed unapplied
    poisoned: bool,
}

impl EngineWorker {
    pub fn new(
        config: EngineConfig,
        cmd_rx: Receiver<EngineCommand>,
        evt_tx: Sender<EngineEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let backpressure = BackpressureController::new(config.latency.clone());
        Self {
            config,
            cmd_rx,
            evt_tx,
            running,
            backpressure,
            pending: VecDeque::new(),
            state: None,
            next_window_seq: BatchSeq(0),
            window_dirty: false,
            poisoned: false,
        }
    }

    /// Run the worker loop until `Terminate` arrives or the command channel
    /// disconnects.
    pub fn run(&mut self) {
        tracing::info!("Engine worker started");

        while self.running.load(Ordering::SeqCst) {
            if self.pending.is_empty() {
                // Fully idle: park until the next command.
                match self.cmd_rx.recv_timeout(IDLE_WAIT) {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            self.process_commands();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            // One batch per pass keeps the endpoint responsive between commits.
            if let Some(job) = self.pending.pop_front() {
                self.commit(job);
            }
            if self.pending.is_empty() {
                self.flush_window();
            }
        }

        tracing::info!("Engine worker stopped");
    }

    /// Drain all immediately available commands. Stops as soon as a
    /// `Terminate` lands so nothing is admitted (or emitted) after shutdown.
    fn process_commands(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Init {
                schema,
                char_width_hint,
                row_height_hint,
                viewport_height,
            } => {
                let state =
                    IngestState::new(schema, char_width_hint, row_height_hint, viewport_height);
                tracing::info!(
                    columns = state.store.schema().len(),
                    "column store initialised"
                );
                self.send_event(EngineEvent::LayoutReady {
                    layout: state.layout.clone(),
                });
                self.state = Some(state);
                self.poisoned = false;
            }
            EngineCommand::Ingest { buffer, seq } => self.admit(seq, buffer),
            EngineCommand::SetWindow {
                start_row,
                row_count,
            } => {
                if let Some(state) = &mut self.state {
                    state.requested = Some((start_row, row_count));
                    self.window_dirty = true;
                }
            }
            EngineCommand::ResizeViewport { height } => {
                if let Some(state) = &mut self.state {
                    state.viewport_height = height;
                    state.recompute_layout();
                }
            }
            EngineCommand::FrameAck { render_ms, seq } => {
                tracing::trace!(?render_ms, window = ?seq, "frame latency sample");
                if let Some(change) = self.backpressure.record_render(render_ms) {
                    self.send_event(EngineEvent::Backpressure {
                        strategy: change.strategy,
                        queue_depth: self.pending.len(),
                        avg_render_ms: change.avg_render_ms,
                    });
                }
            }
            EngineCommand::Terminate => {
                // Controlled shutdown: stop without emitting anything further.
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Enqueue an ingest command, evicting the oldest entry when the queue is
    /// full under SHED. The evicted command still receives its error and ACK
    /// so the pump never stalls on it.
    fn admit(&mut self, seq: BatchSeq, buffer: Vec<u8>) {
        if self.backpressure.strategy() == crate::backpressure::Strategy::Shed
            && self.pending.len() >= self.config.max_queue_depth
        {
            if let Some(evicted) = self.pending.pop_front() {
                tracing::warn!(seq = %evicted.seq, "shed oldest queued ingest");
                self.reject(evicted.seq, &EngineError::Shed);
            }
        }
        self.pending.push_back(QueuedIngest { seq, buffer });
    }

    /// Commit one queued batch: parse, pre-check, append, post-check. Every
    /// exit path ACKs the command.
    fn commit(&mut self, job: QueuedIngest) {
        let seq = job.seq;

        if self.poisoned {
            // The store already failed integrity; keep the pump unblocked
            // without touching the columns again.
            tracing::trace!(%seq, "ignoring ingest into poisoned store");
            self.send_event(EngineEvent::IngestAck { seq });
            return;
        }

        let Some(state) = &mut self.state else {
            self.reject(seq, &EngineError::Source("store not initialised".into()));
            return;
        };

        let parsed = match parse_batch(&job.buffer) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.reject(seq, &e);
                return;
            }
        };

        match state.store.ingest(&parsed) {
            Ok(()) => {
                state.recompute_layout();
                let total_rows = state.store.total_rows();
                self.window_dirty = true;
                self.send_event(EngineEvent::TotalRowsUpdated { total_rows });
                self.send_event(EngineEvent::IngestAck { seq });
            }
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(%seq, error = %e, "store integrity lost");
                    self.poisoned = true;
                } else {
                    tracing::warn!(%seq, error = %e, "batch rejected");
                }
                self.reject(seq, &e);
            }
        }
    }

    /// Emit `IngestError` followed by the mandatory `IngestAck`.
    fn reject(&mut self, seq: BatchSeq, error: &EngineError) {
        self.send_event(EngineEvent::IngestError {
            seq,
            message: error.to_string(),
            fatal: error.is_fatal(),
        });
        self.send_event(EngineEvent::IngestAck { seq });
    }

    /// Pack and emit the requested window, if one is due.
    fn flush_window(&mut self) {
        if !self.window_dirty {
            return;
        }
        let Some(state) = &self.state else { return };
        let Some((start_row, row_count)) = state.requested else {
            return;
        };

        let window = pack_window(
            &state.store,
            &state.layout,
            start_row,
            row_count,
            self.next_window_seq,
        );
        self.next_window_seq = self.next_window_seq.next();
        self.window_dirty = false;
        tracing::trace!(seq = %window.seq, rows = window.row_count, "window emitted");
        self.send_event(EngineEvent::WindowUpdate { window });
    }

    fn send_event(&self, event: EngineEvent) {
        let _ = self.evt_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backpressure::Strategy;
    use crate::codec::{encode_batch, CellValue, Record};
    use crate::types::{ColumnType, Millis};
    use crossbeam_channel::bounded;

    fn create_test_worker() -> (
        EngineWorker,
        Receiver<EngineEvent>,
        Sender<EngineCommand>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(16);
        let (evt_tx, evt_rx) = bounded(64);
        let running = Arc::new(AtomicBool::new(true));
        let worker = EngineWorker::new(EngineConfig::default(), cmd_rx, evt_tx, running);
        (worker, evt_rx, cmd_tx)
    }

    fn schema_x() -> Vec<ColumnSchema> {
        vec![ColumnSchema::new("x", ColumnType::F64, 8)]
    }

    fn init_worker(worker: &mut EngineWorker) {
        worker.handle_command(EngineCommand::Init {
            schema: schema_x(),
            char_width_hint: 9,
            row_height_hint: PixelSize(28),
            viewport_height: PixelSize(280),
        });
    }

    fn batch_x(values: &[f64], seq: u32) -> Vec<u8> {
        let rows: Vec<Record> = values
            .iter()
            .map(|&v| {
                [("x".to_string(), CellValue::Number(v))]
                    .into_iter()
                    .collect()
            })
            .collect();
        encode_batch(&schema_x(), &rows, BatchSeq(seq))
    }

    fn drain(rx: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            events.push(evt);
        }
        events
    }

    #[test]
    fn test_init_emits_layout_ready() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        match drain(&evt_rx).as_slice() {
            [EngineEvent::LayoutReady { layout }] => {
                assert_eq!(layout.total_rows, 0);
                assert_eq!(layout.viewport_rows, 11);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_commit_emits_total_rows_then_ack() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        drain(&evt_rx);

        worker.admit(BatchSeq(5), batch_x(&[1.0, 2.0], 99));
        let job = worker.pending.pop_front().unwrap();
        worker.commit(job);

        match drain(&evt_rx).as_slice() {
            [EngineEvent::TotalRowsUpdated { total_rows: 2 }, EngineEvent::IngestAck { seq }] => {
                // ACK echoes the command seq, not the wire header's.
                assert_eq!(*seq, BatchSeq(5));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_parse_failure_still_acks() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        drain(&evt_rx);

        worker.commit(QueuedIngest {
            seq: BatchSeq(1),
            buffer: vec![0, 1, 2, 3],
        });
        match drain(&evt_rx).as_slice() {
            [EngineEvent::IngestError { seq, fatal: false, .. }, EngineEvent::IngestAck { seq: ack }] =>
            {
                assert_eq!(*seq, BatchSeq(1));
                assert_eq!(*ack, BatchSeq(1));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_schema_mismatch_sequence() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        drain(&evt_rx);

        // Column 0 declared f64 at init, batch declares utf8.
        let bad_schema = vec![ColumnSchema::new("x", ColumnType::Utf8, 8)];
        let row: Record = [("x".to_string(), CellValue::Text("a".into()))]
            .into_iter()
            .collect();
        let buffer = encode_batch(&bad_schema, &[row], BatchSeq(0));
        worker.commit(QueuedIngest {
            seq: BatchSeq(2),
            buffer,
        });

        match drain(&evt_rx).as_slice() {
            [EngineEvent::IngestError { seq, message, fatal: false }, EngineEvent::IngestAck { seq: ack }] =>
            {
                assert_eq!(*seq, BatchSeq(2));
                assert!(message.contains("Schema type mismatch at column 0"));
                assert_eq!(*ack, BatchSeq(2));
            }
            other => panic!("unexpected events: {other:?}"),
        }
        // No mutation applied.
        assert_eq!(worker.state.as_ref().unwrap().store.total_rows(), 0);
    }

    #[test]
    fn test_integrity_violation_poisons_store() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        worker.handle_command(EngineCommand::Init {
            schema: vec![
                ColumnSchema::new("a", ColumnType::F64, 8),
                ColumnSchema::new("b", ColumnType::F64, 8),
            ],
            char_width_hint: 9,
            row_height_hint: PixelSize(28),
            viewport_height: PixelSize(280),
        });
        drain(&evt_rx);

        // A batch carrying only column "a" leaves "b" behind the new total.
        let narrow = vec![ColumnSchema::new("a", ColumnType::F64, 8)];
        let row: Record = [("a".to_string(), CellValue::Number(1.0))]
            .into_iter()
            .collect();
        let buffer = encode_batch(&narrow, &[row], BatchSeq(0));
        worker.commit(QueuedIngest {
            seq: BatchSeq(3),
            buffer,
        });

        match drain(&evt_rx).as_slice() {
            [EngineEvent::IngestError { message, fatal: true, .. }, EngineEvent::IngestAck { .. }] => {
                assert!(message.contains("Integrity violation"));
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // Later ingests are ACKed without being applied.
        worker.commit(QueuedIngest {
            seq: BatchSeq(4),
            buffer: batch_x(&[1.0], 0),
        });
        match drain(&evt_rx).as_slice() {
            [EngineEvent::IngestAck { seq }] => assert_eq!(*seq, BatchSeq(4)),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_shed_evicts_oldest_with_error_then_ack() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        worker.config.max_queue_depth = 2;
        drain(&evt_rx);

        // Push the controller into SHED.
        for _ in 0..4 {
            worker.handle_command(EngineCommand::FrameAck {
                render_ms: Millis(40),
                seq: BatchSeq(0),
            });
        }
        assert_eq!(worker.backpressure.strategy(), Strategy::Shed);
        drain(&evt_rx);

        worker.admit(BatchSeq(0), batch_x(&[1.0], 0));
        worker.admit(BatchSeq(1), batch_x(&[2.0], 1));
        worker.admit(BatchSeq(2), batch_x(&[3.0], 2));

        assert_eq!(worker.pending.len(), 2);
        let seqs: Vec<BatchSeq> = worker.pending.iter().map(|j| j.seq).collect();
        assert_eq!(seqs, vec![BatchSeq(1), BatchSeq(2)]);

        match drain(&evt_rx).as_slice() {
            [EngineEvent::IngestError { seq, message, fatal: false }, EngineEvent::IngestAck { seq: ack }] =>
            {
                assert_eq!(*seq, BatchSeq(0));
                assert_eq!(*ack, BatchSeq(0));
                assert!(message.contains("shed"));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_no_eviction_outside_shed() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        worker.config.max_queue_depth = 2;
        drain(&evt_rx);

        worker.admit(BatchSeq(0), batch_x(&[1.0], 0));
        worker.admit(BatchSeq(1), batch_x(&[2.0], 1));
        worker.admit(BatchSeq(2), batch_x(&[3.0], 2));
        assert_eq!(worker.pending.len(), 3);
        assert!(drain(&evt_rx).is_empty());
    }

    #[test]
    fn test_window_emitted_after_queue_drains_with_monotonic_seq() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        drain(&evt_rx);

        worker.handle_command(EngineCommand::SetWindow {
            start_row: RowIndex(0),
            row_count: 4,
        });
        worker.admit(BatchSeq(0), batch_x(&[1.0, 2.0, 3.0], 0));
        let job = worker.pending.pop_front().unwrap();
        worker.commit(job);
        worker.flush_window();

        let events = drain(&evt_rx);
        let windows: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::WindowUpdate { window } => Some(window),
                _ => None,
            })
            .collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].seq, BatchSeq(0));
        assert_eq!(windows[0].row_count, 3);

        // A second flush without new work emits nothing; a new request bumps
        // the seq.
        worker.flush_window();
        worker.handle_command(EngineCommand::SetWindow {
            start_row: RowIndex(1),
            row_count: 2,
        });
        worker.flush_window();
        let events = drain(&evt_rx);
        match events.as_slice() {
            [EngineEvent::WindowUpdate { window }] => {
                assert_eq!(window.seq, BatchSeq(1));
                assert_eq!(window.start_row, RowIndex(1));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_resize_changes_next_window_layout() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        drain(&evt_rx);

        worker.handle_command(EngineCommand::ResizeViewport {
            height: PixelSize(560),
        });
        // Resize alone emits nothing.
        assert!(drain(&evt_rx).is_empty());

        worker.handle_command(EngineCommand::SetWindow {
            start_row: RowIndex(0),
            row_count: 2,
        });
        worker.flush_window();
        match drain(&evt_rx).as_slice() {
            [EngineEvent::WindowUpdate { window }] => {
                assert_eq!(window.layout.viewport_rows, 21);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_terminate_stops_loop_silently() {
        let (mut worker, evt_rx, cmd_tx) = create_test_worker();
        cmd_tx.send(EngineCommand::Terminate).unwrap();
        worker.process_commands();
        assert!(!worker.running.load(Ordering::SeqCst));
        assert!(drain(&evt_rx).is_empty());
    }

    #[test]
    fn test_backpressure_transition_emits_event_once() {
        let (mut worker, evt_rx, _cmd_tx) = create_test_worker();
        init_worker(&mut worker);
        drain(&evt_rx);

        for _ in 0..3 {
            worker.handle_command(EngineCommand::FrameAck {
                render_ms: Millis(30),
                seq: BatchSeq(0),
            });
        }
        assert!(drain(&evt_rx).is_empty());

        worker.handle_command(EngineCommand::FrameAck {
            render_ms: Millis(30),
            seq: BatchSeq(0),
        });
        match drain(&evt_rx).as_slice() {
            [EngineEvent::Backpressure {
                strategy: Strategy::Shed,
                avg_render_ms,
                ..
            }] => assert!((avg_render_ms - 30.0).abs() < 1e-9),
            other => panic!("unexpected events: {other:?}"),
        }

        // Same-strategy samples are silent.
        worker.handle_command(EngineCommand::FrameAck {
            render_ms: Millis(30),
            seq: BatchSeq(0),
        });
        assert!(drain(&evt_rx).is_empty());
    }
}
