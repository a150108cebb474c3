//! Engine configuration
//!
//! Runtime tunables for the ingest pipeline. The defaults are the values the
//! engine ships with; they exist as configuration so embedders can tighten or
//! relax the pipeline without recompiling.
//!
//! Schema, hints and viewport geometry are not configuration — they arrive
//! through the `Init` command at runtime.

use serde::{Deserialize, Serialize};

/// Default bound on the worker's pending ingest queue
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 64;

/// Default number of render-latency samples kept in the ring
pub const DEFAULT_LATENCY_WINDOW: usize = 8;

/// Default minimum samples before the mean is evaluated
pub const DEFAULT_MIN_LATENCY_SAMPLES: usize = 4;

/// Default mean latency above which the engine sheds queued ingests (ms)
pub const DEFAULT_SHED_THRESHOLD_MS: f64 = 28.0;

/// Default mean latency above which the engine buffers window updates (ms)
pub const DEFAULT_BUFFER_THRESHOLD_MS: f64 = 14.0;

/// Channel capacity for commands (main -> worker)
pub const CMD_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for events (worker -> main).
/// Large enough that window updates never block the worker behind a slow
/// consumer frame.
pub const EVT_CHANNEL_CAPACITY: usize = 1024;

/// Tunables for the backpressure controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Ring size for render-latency samples
    pub window: usize,
    /// Samples required before the mean is acted on
    pub min_samples: usize,
    /// Mean above this enters SHED
    pub shed_threshold_ms: f64,
    /// Mean above this (and at most the shed threshold) enters BUFFER
    pub buffer_threshold_ms: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_LATENCY_WINDOW,
            min_samples: DEFAULT_MIN_LATENCY_SAMPLES,
            shed_threshold_ms: DEFAULT_SHED_THRESHOLD_MS,
            buffer_threshold_ms: DEFAULT_BUFFER_THRESHOLD_MS,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows rendered above and below the visible viewport
    pub overscan_rows: u32,
    /// Bound on the worker's pending ingest queue
    pub max_queue_depth: usize,
    /// Backpressure controller tunables
    pub latency: LatencyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overscan_rows: crate::types::DEFAULT_OVERSCAN_ROWS,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            latency: LatencyConfig::default(),
        }
    }
}
