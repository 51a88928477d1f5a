//! Froth metrics aggregation
//!
//! Turns one frame's bubble set into the five scalar froth metrics.  A
//! short FIFO of recent mean bubble sizes feeds the stability figure; a
//! froth whose bubble size drifts quickly scores low.

use heapless::Deque;
use log::debug;
use serde::{Deserialize, Serialize};

use super::segment::Segmentation;
use crate::config::{MAX_HISTORY, MetricsConfig};

/// One metrics snapshot.  Copied in and out of the shared cell whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrothMetrics {
    pub bubble_count: u32,
    /// Mean bubble area (px²)
    pub avg_bubble_size: f32,
    /// Sample standard deviation of bubble area (px²)
    pub size_std_dev: f32,
    /// Fraction of the frame covered by bubbles, [0, 1]
    pub froth_coverage: f32,
    /// `1 / (1 + σ_recent / K)`, [0, 1]
    pub froth_stability: f32,
    pub timestamp_ms: u64,
    /// False when the camera failed this cycle; numeric fields then hold
    /// the last good values.
    pub success: bool,
}

impl FrothMetrics {
    pub fn coverage_percent(&self) -> f32 {
        self.froth_coverage * 100.0
    }

    pub fn stability_percent(&self) -> f32 {
        self.froth_stability * 100.0
    }
}

/// Fixed-capacity FIFO of recent mean bubble sizes.
#[derive(Debug, Clone)]
pub struct SizeHistory {
    samples: Deque<f32, MAX_HISTORY>,
    window: usize,
}

impl SizeHistory {
    /// `window` is capped at [`MAX_HISTORY`].
    pub fn new(window: usize) -> Self {
        Self {
            samples: Deque::new(),
            window: window.clamp(1, MAX_HISTORY),
        }
    }

    /// Append, evicting the oldest sample once the window is full.
    pub fn push(&mut self, value: f32) {
        while self.samples.len() >= self.window {
            self.samples.pop_front();
        }
        // Cannot fail: at least one slot was freed above.
        let _ = self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn std_dev(&self) -> f32 {
        sample_std_dev(self.samples.iter().copied())
    }
}

/// Sample (n − 1) standard deviation; 0 with fewer than two values.
pub fn sample_std_dev(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let n = values.clone().count();
    if n < 2 {
        return 0.0;
    }
    let mean = values.clone().sum::<f32>() / n as f32;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
    var.sqrt()
}

pub struct MetricsAggregator {
    history: SizeHistory,
    stability_norm: f32,
    last: FrothMetrics,
}

impl MetricsAggregator {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            history: SizeHistory::new(config.history_size),
            stability_norm: config.stability_norm,
            last: FrothMetrics::default(),
        }
    }

    /// Metrics for a successfully captured frame.  Zero bubbles is a valid
    /// measurement.
    pub fn aggregate(&mut self, seg: &Segmentation, now_ms: u64) -> FrothMetrics {
        let areas = seg.regions.iter().map(|r| r.area);
        let count = seg.regions.len();
        let total: f32 = areas.clone().sum();
        let mean = if count == 0 { 0.0 } else { total / count as f32 };
        let coverage = if seg.frame_area() > 0.0 {
            (total / seg.frame_area()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.history.push(mean);
        // An empty frame reports nominal stability; its zero mean still
        // enters the history.
        let stability = if count == 0 {
            1.0
        } else {
            1.0 / (1.0 + self.history.std_dev() / self.stability_norm)
        };

        self.last = FrothMetrics {
            bubble_count: count as u32,
            avg_bubble_size: mean,
            size_std_dev: sample_std_dev(areas),
            froth_coverage: coverage,
            froth_stability: stability.clamp(0.0, 1.0),
            timestamp_ms: now_ms,
            success: true,
        };
        debug!(
            "Metrics: count={} mean={:.1} cov={:.4} stab={:.3}",
            self.last.bubble_count, mean, coverage, self.last.froth_stability
        );
        self.last
    }

    /// Failed cycle: previous values, `success = false`.  History is left
    /// untouched.
    pub fn fail(&mut self, now_ms: u64) -> FrothMetrics {
        FrothMetrics {
            timestamp_ms: now_ms,
            success: false,
            ..self.last
        }
    }

    pub fn history(&self) -> &SizeHistory {
        &self.history
    }
}
