//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService / VisionPipeline (domain)
//! ```
//!
//! Driven adapters (camera, motor outputs, stop input, clock, event sinks,
//! config storage) implement these traits.  The domain consumes them via
//! generics, so the core never touches devices or pin registers directly.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::vision::frame::Frame;

// ───────────────────────────────────────────────────────────────
// Camera port (driven adapter: device → domain)
// ───────────────────────────────────────────────────────────────

/// Single-shot frame grab.  Retry policy lives in
/// [`FrameSource`](crate::vision::frame::FrameSource), not here.
pub trait CameraPort {
    /// Grab one frame stamped with `now_ms`.
    fn grab(&mut self, now_ms: u64) -> Result<Frame, CaptureError>;
}

/// Why a single grab failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// Device could not be opened or disappeared.
    DeviceUnavailable,
    /// Device returned no frame this attempt.
    NoFrame,
    /// Frame bytes could not be decoded.
    DecodeFailed,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceUnavailable => write!(f, "device unavailable"),
            Self::NoFrame => write!(f, "no frame"),
            Self::DecodeFailed => write!(f, "decode failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Motor output port (driven adapter: domain → PWM hardware)
// ───────────────────────────────────────────────────────────────

/// Number of motor channels on the flotation cell.
pub const CHANNEL_COUNT: usize = 4;

/// Motor output channels.  Only the reagent pump is PI-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// Peristaltic reagent dosing pump.
    ReagentPump = 0,
    Agitator = 1,
    AirPump = 2,
    FeedPump = 3,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::ReagentPump,
        ChannelId::Agitator,
        ChannelId::AirPump,
        ChannelId::FeedPump,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReagentPump => write!(f, "reagent_pump"),
            Self::Agitator => write!(f, "agitator"),
            Self::AirPump => write!(f, "air_pump"),
            Self::FeedPump => write!(f, "feed_pump"),
        }
    }
}

/// Write-side port: the domain calls this to command motors.
///
/// Receivers are expected to be idempotent and saturating; the domain
/// enforces its own clamps regardless.
pub trait MotorOutputPort {
    /// Set a channel's duty cycle (percent, 0–100).
    fn set_duty(&mut self, channel: ChannelId, percent: f32) -> Result<(), MotorError>;
}

/// Errors from [`MotorOutputPort`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// No output is wired to this channel.
    ChannelUnavailable,
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::ChannelUnavailable => write!(f, "channel unavailable"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Stop signal port (driven adapter: E-stop input → domain)
// ───────────────────────────────────────────────────────────────

/// Boolean level sampled once per control cycle.
pub trait StopSignalPort {
    /// `true` while the external emergency stop is asserted.
    fn is_asserted(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since an arbitrary epoch.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and stores system configuration.
///
/// Implementations MUST validate before returning; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate then persist.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
