//! System configuration parameters
//!
//! All tunable parameters for the froth controller.  Supplied once at start
//! (JSON file via [`ConfigPort`](crate::app::ports::ConfigPort) or
//! defaults); gains, setpoint and manual duties change live only through the
//! command intake.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::pi::ControlMode;

/// Upper bound on the stability history window (heapless capacity).
pub const MAX_HISTORY: usize = 32;

/// Core system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub camera: CameraConfig,
    pub vision: VisionConfig,
    pub metrics: MetricsConfig,
    pub control: ControlConfig,
    pub safety: SafetyConfig,
    pub timing: TimingConfig,
}

/// Frame acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Expected frame width (pixels)
    pub frame_width: u32,
    /// Expected frame height (pixels)
    pub frame_height: u32,
    /// Attempts per acquisition before reporting the camera unavailable
    pub capture_attempts: u8,
    /// Fixed delay between attempts (milliseconds)
    pub retry_delay_ms: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            capture_attempts: 5,
            retry_delay_ms: 2000,
        }
    }
}

/// Binarisation method for the segmenter's threshold stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Global Otsu threshold.
    Otsu,
    /// Local mean over a `block_size` window minus `offset`.
    AdaptiveMean { block_size: u32, offset: i16 },
}

/// Segmenter tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Gaussian blur kernel size (odd, 1 = no blur)
    pub blur_kernel: u32,
    pub threshold: ThresholdMethod,
    /// Dark pixels are foreground (froth bubbles render darker than lamellae)
    pub invert_threshold: bool,
    /// Elliptical structuring element size (odd, 1 = identity)
    pub morph_kernel: u32,
    pub opening_iterations: u8,
    pub closing_iterations: u8,
    /// Fraction of the peak distance-transform value that seeds a marker
    pub distance_threshold: f32,
    /// Contour area bounds (px²)
    pub min_bubble_area: f32,
    pub max_bubble_area: f32,
    /// Minimum `4π·area / perimeter²`
    pub min_circularity: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 3,
            threshold: ThresholdMethod::Otsu,
            invert_threshold: true,
            morph_kernel: 3,
            opening_iterations: 1,
            closing_iterations: 1,
            distance_threshold: 0.125,
            min_bubble_area: 80.0,
            max_bubble_area: 20_000.0,
            min_circularity: 0.45,
        }
    }
}

/// Metrics aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Rolling window of mean sizes used for stability (≤ [`MAX_HISTORY`])
    pub history_size: usize,
    /// Normalisation constant K in `1 / (1 + σ / K)`
    pub stability_norm: f32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_size: 10,
            stability_norm: 100.0,
        }
    }
}

/// PI actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub kp: f32,
    pub ki: f32,
    /// Target bubble count
    pub setpoint: f32,
    /// Hard ceiling on every duty (percent, ≤ 100)
    pub max_duty: f32,
    pub initial_mode: ControlMode,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.05,
            setpoint: 120.0,
            max_duty: 80.0,
            initial_mode: ControlMode::Manual,
        }
    }
}

/// Safety supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Maximum metrics age in auto mode before the watchdog trips
    pub watchdog_timeout_ms: u64,
    /// Sample the external stop input each control cycle
    pub estop_enabled: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: 5000,
            estop_enabled: true,
        }
    }
}

/// Task cadences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Vision task period (milliseconds)
    pub vision_interval_ms: u32,
    /// Control task period (milliseconds)
    pub control_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            vision_interval_ms: 500,    // 2 Hz
            control_interval_ms: 1000,  // 1 Hz
            telemetry_interval_secs: 60,
        }
    }
}

impl SystemConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode a compact postcard blob, as written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::IoError)
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.vision;
        if v.blur_kernel == 0 || v.blur_kernel % 2 == 0 {
            return Err(ConfigError::ValidationFailed("vision.blur_kernel must be odd"));
        }
        if v.morph_kernel == 0 || v.morph_kernel % 2 == 0 {
            return Err(ConfigError::ValidationFailed("vision.morph_kernel must be odd"));
        }
        if let ThresholdMethod::AdaptiveMean { block_size, .. } = v.threshold {
            if block_size < 3 || block_size % 2 == 0 {
                return Err(ConfigError::ValidationFailed(
                    "vision.threshold.block_size must be odd and >= 3",
                ));
            }
        }
        if !(v.distance_threshold > 0.0 && v.distance_threshold < 1.0) {
            return Err(ConfigError::ValidationFailed(
                "vision.distance_threshold must be in (0, 1)",
            ));
        }
        if !(v.min_bubble_area >= 0.0 && v.min_bubble_area <= v.max_bubble_area) {
            return Err(ConfigError::ValidationFailed(
                "vision bubble area bounds must satisfy 0 <= min <= max",
            ));
        }
        if !(0.0..=1.0).contains(&v.min_circularity) {
            return Err(ConfigError::ValidationFailed(
                "vision.min_circularity must be in [0, 1]",
            ));
        }

        let m = &self.metrics;
        if m.history_size == 0 || m.history_size > MAX_HISTORY {
            return Err(ConfigError::ValidationFailed("metrics.history_size out of range"));
        }
        if !(m.stability_norm > 0.0) {
            return Err(ConfigError::ValidationFailed("metrics.stability_norm must be positive"));
        }

        let c = &self.control;
        if !c.kp.is_finite() || !c.ki.is_finite() {
            return Err(ConfigError::ValidationFailed("control gains must be finite"));
        }
        if !(c.setpoint >= 0.0 && c.setpoint.is_finite()) {
            return Err(ConfigError::ValidationFailed("control.setpoint must be non-negative"));
        }
        if !(0.0..=100.0).contains(&c.max_duty) {
            return Err(ConfigError::ValidationFailed("control.max_duty must be in [0, 100]"));
        }

        if self.camera.capture_attempts == 0 {
            return Err(ConfigError::ValidationFailed("camera.capture_attempts must be >= 1"));
        }
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            return Err(ConfigError::ValidationFailed("camera frame size must be non-zero"));
        }

        let t = &self.timing;
        if t.vision_interval_ms == 0 || t.control_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("task intervals must be non-zero"));
        }
        if self.safety.watchdog_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("safety.watchdog_timeout_ms must be non-zero"));
        }
        Ok(())
    }
}
