//! Froth vision: frame acquisition, bubble segmentation, metrics.

pub mod contour;
pub mod filters;
pub mod frame;
pub mod metrics;
pub mod segment;
pub mod watershed;

pub use frame::{Frame, FrameSource, RetryPolicy};
pub use metrics::{FrothMetrics, MetricsAggregator};
pub use segment::{Segmentation, Segmenter};
