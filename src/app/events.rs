//! Outbound application events.
//!
//! The [`ControlService`](super::service::ControlService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log lines, a dashboard
//! push channel, a historian.

use serde::Serialize;

use super::ports::CHANNEL_COUNT;
use crate::control::pi::ControlMode;
use crate::error::CommandError;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial mode).
    Started(ControlMode),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// Operator switched the reagent pump mode.
    ModeChanged { from: ControlMode, to: ControlMode },

    /// The PI output entered saturation.  Informational only.
    Saturated { raw: f32, output: f32 },

    /// The supervisor tripped; carries the latched fault bitmask.
    SafetyTripped(u8),

    /// The latch was cleared by an explicit reset.
    SafetyReset,

    /// Vision cycles are failing; metrics are stale.
    VisionDegraded,

    /// A successful vision cycle followed a failure streak.
    VisionRestored,

    /// An inbound command was refused.
    CommandRejected(CommandError),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryData {
    pub mode: ControlMode,
    pub bubble_count: u32,
    pub avg_bubble_size: f32,
    pub froth_coverage: f32,
    pub froth_stability: f32,
    pub vision_ok: bool,
    pub setpoint: f32,
    pub integral: f32,
    /// Applied duty per channel after the safety gate (percent).
    pub duties: [f32; CHANNEL_COUNT],
    pub fault_flags: u8,
    pub cycle_count: u64,
}
