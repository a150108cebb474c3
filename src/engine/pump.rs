//! Main-side ingest pump
//!
//! Drives a lazy batch source into the worker with exactly one batch in
//! flight: each `Ingest` command is registered for acknowledgement before it
//! is posted, and the pump blocks until that ACK returns. Every event that
//! arrives while waiting is dispatched to the consumer state store, so window
//! updates and backpressure changes keep flowing during ingest.
//!
//! Unblocking guarantees:
//!
//! - worker channel disconnect while waiting -> `TransportCrash`, status
//!   `error`, the registered ACK is rejected
//! - abort flag set by the consumer -> `Aborted`, the registered ACK is
//!   released, no failure status
//! - `Terminate` initiated by this side -> the registered ACK resolves and
//!   the pump ends cleanly

use crate::engine::bridge::{EngineCommand, EngineEvent};
use crate::error::{EngineError, Result};
use crate::state::{StateStore, StoreStatus};
use crate::types::BatchSeq;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the ACK wait rechecks the abort flag.
const ACK_POLL: Duration = Duration::from_millis(20);

/// Outcome of one ACK wait.
enum AckWait {
    Acked,
    Terminated,
}

/// One-in-flight pump over a fallible stream of encoded batches.
pub(crate) struct IngestPump<'a> {
    pub cmd_tx: &'a Sender<EngineCommand>,
    pub evt_rx: &'a Receiver<EngineEvent>,
    pub store: &'a mut StateStore,
    pub abort: &'a Arc<AtomicBool>,
    pub next_seq: &'a mut BatchSeq,
    /// Seq registered for acknowledgement; at most one at any instant.
    pub pending_ack: &'a mut Option<BatchSeq>,
    /// Set when this side sent `Terminate`; disconnects then resolve cleanly.
    pub terminated: &'a bool,
}

impl IngestPump<'_> {
    /// Run the source to exhaustion. Returns `Ok` on completion or controlled
    /// termination.
    pub fn run<I>(&mut self, source: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Vec<u8>>>,
    {
        self.store.set_status(StoreStatus::Streaming, None);
        tracing::info!("ingest pump started");

        for item in source {
            if self.abort.load(Ordering::SeqCst) {
                tracing::info!("ingest pump aborted");
                *self.pending_ack = None;
                return Err(EngineError::Aborted);
            }

            let buffer = match item {
                Ok(buffer) => buffer,
                Err(e) => {
                    self.store
                        .set_status(StoreStatus::Error, Some(e.to_string()));
                    return Err(e);
                }
            };

            let seq = *self.next_seq;
            *self.next_seq = seq.next();

            // Register the expected ACK before posting so a fast worker can
            // never answer an unregistered command.
            *self.pending_ack = Some(seq);
            if self.cmd_tx.send(EngineCommand::Ingest { buffer, seq }).is_err() {
                *self.pending_ack = None;
                if *self.terminated {
                    tracing::info!("ingest pump stopped by terminate");
                    return Ok(());
                }
                let err = EngineError::TransportCrash("command channel closed".into());
                self.store
                    .set_status(StoreStatus::Error, Some(err.to_string()));
                return Err(err);
            }

            match self.wait_for_ack(seq)? {
                AckWait::Acked => {}
                AckWait::Terminated => {
                    tracing::info!("ingest pump stopped by terminate");
                    return Ok(());
                }
            }
        }

        self.store.set_status(StoreStatus::Complete, None);
        tracing::info!("ingest pump completed");
        Ok(())
    }

    /// Block until the ACK for `seq` arrives, dispatching every intervening
    /// event to the state store.
    fn wait_for_ack(&mut self, seq: BatchSeq) -> Result<AckWait> {
        loop {
            if self.abort.load(Ordering::SeqCst) {
                *self.pending_ack = None;
                return Err(EngineError::Aborted);
            }

            match self.evt_rx.recv_timeout(ACK_POLL) {
                Ok(event) => {
                    let acked = matches!(&event, EngineEvent::IngestAck { seq: s } if *s == seq);
                    self.store.dispatch(event);
                    if acked {
                        *self.pending_ack = None;
                        return Ok(AckWait::Acked);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // Pending ACKs resolve on controlled shutdown and reject
                    // on a crash.
                    *self.pending_ack = None;
                    if *self.terminated {
                        return Ok(AckWait::Terminated);
                    }
                    let err = EngineError::TransportCrash("worker endpoint lost".into());
                    tracing::error!(%seq, "worker transport lost while awaiting ack");
                    self.store
                        .set_status(StoreStatus::Error, Some(err.to_string()));
                    return Err(err);
                }
            }
        }
    }
}
