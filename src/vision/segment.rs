//! Frame → bubble regions.
//!
//! Stage order: grayscale, Gaussian blur, threshold, opening then
//! closing, distance transform, marker watershed, contour extraction,
//! area / circularity filter.  The same frame and parameters always give
//! the same regions in the same order.

use log::{debug, warn};
use serde::Serialize;

use super::contour::{BubbleRegion, extract_regions};
use super::filters::{check_kernel, close, ellipse_offsets, gaussian_blur, open, threshold};
use super::frame::Frame;
use super::watershed::{distance_transform, flood, markers};
use crate::config::VisionConfig;
use crate::error::SegmentationFailure;

/// Accepted bubbles of one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Segmentation {
    pub regions: Vec<BubbleRegion>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Segmentation {
    pub fn empty(frame_width: u32, frame_height: u32) -> Self {
        Self {
            regions: Vec::new(),
            frame_width,
            frame_height,
        }
    }

    pub fn frame_area(&self) -> f32 {
        self.frame_width as f32 * self.frame_height as f32
    }

    /// Mean equivalent diameter (px), 0 when no bubbles.
    pub fn avg_diameter(&self) -> f32 {
        if self.regions.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.regions.iter().map(BubbleRegion::equivalent_diameter).sum();
        sum / self.regions.len() as f32
    }
}

pub struct Segmenter {
    config: VisionConfig,
    morph_offsets: Vec<(i32, i32)>,
}

impl Segmenter {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            morph_offsets: ellipse_offsets(config.morph_kernel),
            config: config.clone(),
        }
    }

    /// Segment, collapsing any stage fault into an empty result.
    pub fn segment(&self, frame: &Frame) -> Segmentation {
        match self.try_segment(frame) {
            Ok(seg) => seg,
            Err(e) => {
                warn!("Segmentation failed: {e}; reporting zero bubbles");
                Segmentation::empty(frame.width(), frame.height())
            }
        }
    }

    pub fn try_segment(&self, frame: &Frame) -> Result<Segmentation, SegmentationFailure> {
        let cfg = &self.config;
        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 {
            return Err(SegmentationFailure::EmptyFrame);
        }
        check_kernel(cfg.morph_kernel)?;

        let gray = frame.to_gray();
        let blurred = gaussian_blur(&gray, cfg.blur_kernel)?;
        let binary = threshold(&blurred, cfg.threshold, cfg.invert_threshold);
        let opened = open(&binary, &self.morph_offsets, cfg.opening_iterations);
        let cleaned = close(&opened, &self.morph_offsets, cfg.closing_iterations);

        let distance = distance_transform(&cleaned);
        if distance.len() != (w * h) as usize {
            return Err(SegmentationFailure::DimensionMismatch);
        }
        let seeds = markers(&distance, w, h, cfg.distance_threshold);
        let basins = flood(&cleaned, &distance, seeds);

        let candidates = extract_regions(&basins);
        let total = candidates.len();
        let regions: Vec<BubbleRegion> = candidates
            .into_iter()
            .filter(|r| {
                r.area >= cfg.min_bubble_area
                    && r.area <= cfg.max_bubble_area
                    && r.circularity >= cfg.min_circularity
            })
            .collect();

        debug!(
            "Segmented {}x{}: {} basins, {} bubbles kept",
            w,
            h,
            total,
            regions.len()
        );

        Ok(Segmentation {
            regions,
            frame_width: w,
            frame_height: h,
        })
    }
}
