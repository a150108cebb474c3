//! Adaptive backpressure controller
//!
//! Tracks a rolling window of render-latency samples and maps their mean onto
//! one of three strategies. The controller itself only classifies; queue
//! eviction and window coalescing are enforced by the worker.
//!
//! | mean latency | strategy |
//! |---|---|
//! | > 28 ms | SHED |
//! | (14, 28] ms | BUFFER |
//! | <= 14 ms | NOMINAL |
//!
//! The mean is acted on once at least four samples have arrived. A strategy
//! change is reported exactly once per transition; same-strategy samples are
//! silent.

use crate::config::LatencyConfig;
use crate::types::Millis;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How the worker responds to render pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Emit every update
    #[default]
    Nominal,
    /// Coalesce window updates until the ingest queue drains
    Buffer,
    /// Additionally evict the oldest queued ingest when the queue is full
    Shed,
}

/// A strategy transition, emitted to the consumer as a `BACKPRESSURE` event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyChange {
    pub strategy: Strategy,
    pub avg_render_ms: f64,
}

/// Rolling-mean latency classifier.
#[derive(Debug)]
pub struct BackpressureController {
    config: LatencyConfig,
    samples: VecDeque<f64>,
    strategy: Strategy,
}

impl BackpressureController {
    pub fn new(config: LatencyConfig) -> Self {
        let window = config.window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            config: LatencyConfig { window, ..config },
            strategy: Strategy::Nominal,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Mean of the samples currently in the ring; 0 when empty.
    pub fn avg_render_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Record one frame latency. Returns `Some` only when the sample moves
    /// the controller to a different strategy.
    pub fn record_render(&mut self, latency: Millis) -> Option<StrategyChange> {
        if self.samples.len() == self.config.window {
            self.samples.pop_front();
        }
        self.samples.push_back(latency.as_f64());

        if self.samples.len() < self.config.min_samples {
            return None;
        }

        let mean = self.avg_render_ms();
        let next = if mean > self.config.shed_threshold_ms {
            Strategy::Shed
        } else if mean > self.config.buffer_threshold_ms {
            Strategy::Buffer
        } else {
            Strategy::Nominal
        };

        if next == self.strategy {
            return None;
        }
        tracing::debug!(?next, mean_ms = mean, "backpressure strategy changed");
        self.strategy = next;
        Some(StrategyChange {
            strategy: next,
            avg_render_ms: mean,
        })
    }
}
