//! Consumer-facing state store
//!
//! Owned by the main task; the worker never sees it. Every applied event or
//! setter produces a new immutable snapshot (`Arc<StoreState>`) if and only
//! if some field actually changed, and listeners run synchronously after each
//! mutation.
//!
//! Slice subscriptions layer a selector plus an equality predicate on top of
//! a plain listener: the selector reruns only when the snapshot reference
//! changes, and the observer fires only when the projected value compares
//! unequal. Each subscription keeps its own last-snapshot cache.

use crate::backpressure::Strategy;
use crate::engine::bridge::EngineEvent;
use crate::types::{PixelSize, ViewportLayout};
use crate::window::DataWindow;
use std::sync::Arc;

/// Consumer-visible pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreStatus {
    #[default]
    Idle,
    Streaming,
    Complete,
    Error,
}

/// Last reported backpressure posture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackpressureStats {
    pub strategy: Strategy,
    pub queue_depth: usize,
    pub avg_render_ms: f64,
}

/// One immutable snapshot of everything the renderer needs.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub status: StoreStatus,
    pub layout: Option<ViewportLayout>,
    /// Latest window; the buffer inside belongs to the consumer now
    pub window: Option<Arc<DataWindow>>,
    pub backpressure: BackpressureStats,
    pub total_rows: u32,
    /// Most recent failure, formatted `"Batch {seq}: {message}"`
    pub error: Option<String>,
    /// Consumer-measured row height; zero means "unset, use the layout's"
    pub pitch: PixelSize,
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Arc<StoreState>)>;

/// Snapshot holder with synchronous listener fan-out.
pub struct StateStore {
    state: Arc<StoreState>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StoreState::default()),
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// The current snapshot. Two calls return the same `Arc` unless a
    /// mutation happened in between.
    pub fn state(&self) -> Arc<StoreState> {
        Arc::clone(&self.state)
    }

    /// Register a listener invoked synchronously after every state mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&Arc<StoreState>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if the id was already gone.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Register a slice observer and return its initial projection.
    ///
    /// The selector reruns only when the snapshot reference changes;
    /// `on_change` fires only when `equality` reports the projection changed.
    pub fn subscribe_slice<T, Sel, Eq, F>(
        &mut self,
        selector: Sel,
        equality: Eq,
        mut on_change: F,
    ) -> (ListenerId, T)
    where
        T: Clone + 'static,
        Sel: Fn(&StoreState) -> T + 'static,
        Eq: Fn(&T, &T) -> bool + 'static,
        F: FnMut(&T) + 'static,
    {
        let initial = selector(&self.state);
        let mut last_state = Arc::clone(&self.state);
        let mut last_value = initial.clone();
        let id = self.subscribe(move |state| {
            if Arc::ptr_eq(&last_state, state) {
                return;
            }
            last_state = Arc::clone(state);
            let next = selector(state);
            if !equality(&last_value, &next) {
                last_value = next;
                on_change(&last_value);
            }
        });
        (id, initial)
    }

    /// Set the pipeline status, optionally recording an error message.
    pub fn set_status(&mut self, status: StoreStatus, error_message: Option<String>) {
        let current = &self.state;
        let error = match error_message {
            Some(message) => Some(message),
            None => current.error.clone(),
        };
        if current.status == status && current.error == error {
            return;
        }
        let mut next = (**current).clone();
        next.status = status;
        next.error = error;
        self.commit(next);
    }

    /// Record the consumer-measured row pitch. Zero restores the layout's
    /// computed row height.
    pub fn set_pitch(&mut self, pitch: PixelSize) {
        if self.state.pitch == pitch {
            return;
        }
        let mut next = (*self.state).clone();
        next.pitch = pitch;
        self.commit(next);
    }

    /// Apply one worker event. Events that change nothing leave the snapshot
    /// reference untouched.
    pub fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::LayoutReady { layout } => {
                if self.state.layout.as_ref() == Some(&layout) {
                    return;
                }
                let mut next = (*self.state).clone();
                next.layout = Some(layout);
                self.commit(next);
            }
            EngineEvent::WindowUpdate { window } => {
                let mut next = (*self.state).clone();
                next.total_rows = window.layout.total_rows;
                next.layout = Some(window.layout.clone());
                next.window = Some(Arc::new(window));
                self.commit(next);
            }
            EngineEvent::Backpressure {
                strategy,
                queue_depth,
                avg_render_ms,
            } => {
                let stats = BackpressureStats {
                    strategy,
                    queue_depth,
                    avg_render_ms,
                };
                if self.state.backpressure == stats {
                    return;
                }
                let mut next = (*self.state).clone();
                next.backpressure = stats;
                self.commit(next);
            }
            EngineEvent::TotalRowsUpdated { total_rows } => {
                if self.state.total_rows == total_rows {
                    return;
                }
                let mut next = (*self.state).clone();
                next.total_rows = total_rows;
                self.commit(next);
            }
            EngineEvent::IngestError {
                seq,
                message,
                fatal,
            } => {
                let error = Some(format!("Batch {seq}: {message}"));
                let status = if fatal {
                    StoreStatus::Error
                } else {
                    self.state.status
                };
                if self.state.error == error && self.state.status == status {
                    return;
                }
                let mut next = (*self.state).clone();
                next.error = error;
                next.status = status;
                self.commit(next);
            }
            EngineEvent::IngestAck { .. } => {}
        }
    }

    fn commit(&mut self, next: StoreState) {
        self.state = Arc::new(next);
        let state = Arc::clone(&self.state);

        // Listeners may subscribe re-entrantly; park the current set while
        // notifying and merge any additions afterwards.
        let mut active = std::mem::take(&mut self.listeners);
        for (_, listener) in active.iter_mut() {
            listener(&state);
        }
        active.append(&mut self.listeners);
        self.listeners = active;
    }
}
