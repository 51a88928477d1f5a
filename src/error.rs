//! Unified error types for the froth controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! orchestrator's error handling uniform.  All variants are `Copy` so they
//! can be passed through the safety supervisor and event sink without
//! allocation.
//!
//! Vision-side faults ([`CaptureError`], [`SegmentationFailure`]) are
//! absorbed where they occur and degrade to stale-but-valid metrics.  Only
//! [`SafetyFault`]s cross into actuation-affecting state.

use core::fmt;

use crate::app::ports::{CaptureError, ConfigError, MotorError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The frame source exhausted its retries.
    CameraUnavailable(CaptureError),
    /// A segmentation stage rejected its input.
    Segmentation(SegmentationFailure),
    /// A motor-output write failed.
    Motor(MotorError),
    /// The safety supervisor is tripped.
    Safety(SafetyFault),
    /// An inbound command was rejected.
    Command(CommandError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CameraUnavailable(e) => write!(f, "camera unavailable: {e}"),
            Self::Segmentation(e) => write!(f, "segmentation: {e}"),
            Self::Motor(e) => write!(f, "motor: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Self::CameraUnavailable(e)
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Self::Motor(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Segmentation failures
// ---------------------------------------------------------------------------

/// A segmentation stage could not process its input.  The segmenter turns
/// every variant into an empty region set for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationFailure {
    /// Frame has zero width or height.
    EmptyFrame,
    /// A kernel size is even or zero.
    InvalidKernel(u32),
    /// Pixel buffer length does not match the stated dimensions.
    DimensionMismatch,
}

impl fmt::Display for SegmentationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFrame => write!(f, "empty frame"),
            Self::InvalidKernel(k) => write!(f, "invalid kernel size {k}"),
            Self::DimensionMismatch => write!(f, "buffer/dimension mismatch"),
        }
    }
}

impl From<SegmentationFailure> for Error {
    fn from(e: SegmentationFailure) -> Self {
        Self::Segmentation(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Conditions that trip the safety supervisor.  Accumulated in a latched
/// bitmask; only an explicit reset clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// External stop signal asserted or software E-stop commanded.
    EmergencyStop = 0b0000_0001,
    /// No successful metrics update within the staleness bound in auto mode.
    WatchdogTimeout = 0b0000_0010,
}

impl SafetyFault {
    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmergencyStop => write!(f, "emergency stop"),
            Self::WatchdogTimeout => write!(f, "vision watchdog timeout"),
        }
    }
}

impl From<SafetyFault> for Error {
    fn from(e: SafetyFault) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Reasons an inbound command is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A value failed its range check (field name attached).
    OutOfRange(&'static str),
    /// The supervisor is tripped; actuation commands are locked out.
    SafetyLocked,
    /// Reset refused because the external stop signal is still asserted.
    StopSignalAsserted,
    /// The command queue is full.
    QueueFull,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(field) => write!(f, "{field} out of range"),
            Self::SafetyLocked => write!(f, "safety lockout active"),
            Self::StopSignalAsserted => write!(f, "stop signal still asserted"),
            Self::QueueFull => write!(f, "command queue full"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_masks_are_distinct_bits() {
        assert_eq!(
            SafetyFault::EmergencyStop.mask() & SafetyFault::WatchdogTimeout.mask(),
            0
        );
    }

    #[test]
    fn display_carries_context() {
        let e: Error = CommandError::OutOfRange("setpoint").into();
        assert_eq!(e.to_string(), "command: setpoint out of range");
        let e: Error = SafetyFault::WatchdogTimeout.into();
        assert_eq!(e.to_string(), "safety: vision watchdog timeout");
    }
}
