//! Frames and the retrying frame source.
//!
//! A [`Frame`] is owned by the vision cycle that produced it and dropped at
//! the end of that cycle.  [`FrameSource`] wraps a [`CameraPort`] with a
//! bounded retry policy: it never blocks for longer than
//! `attempts × delay`.

use core::time::Duration;

use image::{GrayImage, RgbImage};
use log::{debug, error, warn};

use crate::app::ports::{CameraPort, CaptureError};
use crate::config::CameraConfig;

/// Pixel payload as delivered by the camera.
#[derive(Debug, Clone)]
pub enum FramePixels {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// A captured, timestamped image.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: FramePixels,
    /// Capture time (ms, same clock as the orchestrator).
    pub captured_at_ms: u64,
}

impl Frame {
    pub fn gray(image: GrayImage, captured_at_ms: u64) -> Self {
        Self {
            pixels: FramePixels::Gray(image),
            captured_at_ms,
        }
    }

    pub fn rgb(image: RgbImage, captured_at_ms: u64) -> Self {
        Self {
            pixels: FramePixels::Rgb(image),
            captured_at_ms,
        }
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            FramePixels::Gray(img) => img.width(),
            FramePixels::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.pixels {
            FramePixels::Gray(img) => img.height(),
            FramePixels::Rgb(img) => img.height(),
        }
    }

    /// Pixel count, the denominator of froth coverage.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Single-channel view (luma conversion for RGB frames).
    pub fn to_gray(&self) -> GrayImage {
        match &self.pixels {
            FramePixels::Gray(img) => img.clone(),
            FramePixels::Rgb(img) => image::imageops::grayscale(img),
        }
    }
}

/// Attempt count and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            attempts: config.capture_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms as u64),
        }
    }
}

/// Camera wrapper with bounded retry.
pub struct FrameSource<C: CameraPort> {
    camera: C,
    policy: RetryPolicy,
    consecutive_failures: u32,
}

impl<C: CameraPort> FrameSource<C> {
    pub fn new(camera: C, policy: RetryPolicy) -> Self {
        Self {
            camera,
            policy,
            consecutive_failures: 0,
        }
    }

    /// Grab a frame, retrying up to the policy bound.  `now_ms` is
    /// called once per attempt so each frame carries its own capture time.
    ///
    /// Waits between attempts yield to the executor; the control task keeps
    /// running while the camera recovers.
    pub async fn acquire(&mut self, now_ms: impl Fn() -> u64) -> Result<Frame, CaptureError> {
        let mut last_err = CaptureError::NoFrame;
        for attempt in 1..=self.policy.attempts {
            match self.camera.grab(now_ms()) {
                Ok(frame) => {
                    if self.consecutive_failures > 0 {
                        debug!(
                            "Camera recovered after {} failed acquisitions",
                            self.consecutive_failures
                        );
                    }
                    self.consecutive_failures = 0;
                    return Ok(frame);
                }
                Err(e) => {
                    warn!(
                        "Capture attempt {}/{} failed: {}",
                        attempt, self.policy.attempts, e
                    );
                    last_err = e;
                }
            }
            if attempt < self.policy.attempts && !self.policy.delay.is_zero() {
                async_io_mini::Timer::after(self.policy.delay).await;
            }
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        error!(
            "Camera unavailable after {} attempts ({})",
            self.policy.attempts, last_err
        );
        Err(last_err)
    }

    /// Acquisitions in a row that exhausted every retry.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
