//! Safety supervisor.
//!
//! The supervisor runs **every control cycle after the PI step** and gates
//! every duty on its way to the motor outputs.  Faults accumulate in a
//! latched bitmask.
//!
//! ## Fault lifecycle
//!
//! 1. A condition trips a fault (stop input asserted, software E-stop, or
//!    the vision watchdog expiring in auto mode).
//! 2. The supervisor sets the fault bit and enters `Tripped`; from then on
//!    [`gate`](SafetySupervisor::gate) returns 0 for every channel.
//! 3. The bit stays set when the condition clears.  Only an explicit
//!    [`reset`](SafetySupervisor::reset) returns the supervisor to `Armed`,
//!    and it is refused while the stop input is still asserted.
//!
//! Independently of the latch, every duty is clamped to `[0, max_duty]`
//! here as well as in the controller.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::control::pi::{ControlMode, clamp_duty};
use crate::error::{CommandError, SafetyFault};
use crate::vision::metrics::FrothMetrics;

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Armed,
    Tripped,
}

/// Exported safety record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyState {
    pub state: SupervisorState,
    /// An emergency stop (input or commanded) is latched.
    pub estop_active: bool,
    /// Timestamp of the last successful metrics update (ms).
    pub last_vision_update_ms: u64,
    /// No actuation is forwarded until reset.
    pub locked_out: bool,
    /// Latched fault bitmask (see [`SafetyFault::mask`]).
    pub faults: u8,
    /// Most recent sample of the stop input.
    pub stop_signal: bool,
}

/// Safety supervisor.
pub struct SafetySupervisor {
    watchdog_timeout_ms: u64,
    max_duty: f32,
    estop_enabled: bool,
    /// Latched fault bitmask.
    faults: u8,
    /// Last sampled stop level.
    stop_level: bool,
    last_vision_update_ms: u64,
}

impl SafetySupervisor {
    /// `now_ms` seeds the watchdog so a fresh start gets one full window.
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        Self {
            watchdog_timeout_ms: config.safety.watchdog_timeout_ms,
            max_duty: config.control.max_duty,
            estop_enabled: config.safety.estop_enabled,
            faults: 0,
            stop_level: false,
            last_vision_update_ms: now_ms,
        }
    }

    /// Feed the watchdog from the latest metrics snapshot.  Only successful
    /// updates newer than the last one count.
    pub fn observe_metrics(&mut self, metrics: &FrothMetrics) {
        if metrics.success && metrics.timestamp_ms > self.last_vision_update_ms {
            self.last_vision_update_ms = metrics.timestamp_ms;
        }
    }

    /// Evaluate all trip conditions.  Returns the latched fault bitmask.
    pub fn evaluate(&mut self, stop_asserted: bool, mode: ControlMode, now_ms: u64) -> u8 {
        self.sample_stop(stop_asserted);

        // ── External stop input ───────────────────────────────────
        if self.stop_level {
            self.latch(SafetyFault::EmergencyStop);
        }

        // ── Vision staleness (auto mode only) ─────────────────────
        if mode == ControlMode::Auto {
            let age = now_ms.saturating_sub(self.last_vision_update_ms);
            if age > self.watchdog_timeout_ms {
                if !self.has_fault(SafetyFault::WatchdogTimeout) {
                    warn!(
                        "Vision metrics stale for {} ms (limit {} ms)",
                        age, self.watchdog_timeout_ms
                    );
                }
                self.latch(SafetyFault::WatchdogTimeout);
            }
        }

        self.faults
    }

    /// Record the stop input level without evaluating trips.  Lets a reset
    /// see the button state of now rather than of the last cycle.
    pub fn sample_stop(&mut self, stop_asserted: bool) {
        self.stop_level = self.estop_enabled && stop_asserted;
    }

    /// Latch a fault from a command (software E-stop).
    pub fn trigger(&mut self, fault: SafetyFault) {
        self.latch(fault);
    }

    /// Clear the latch.  Refused while the stop input is still asserted.
    pub fn reset(&mut self) -> Result<(), CommandError> {
        if self.stop_level {
            warn!("Safety reset refused: stop signal still asserted");
            return Err(CommandError::StopSignalAsserted);
        }
        if self.faults != 0 {
            info!("SAFETY RESET: cleared faults=0b{:08b}", self.faults);
        }
        // The staleness window is not restarted: a dead camera trips
        // again on the next auto cycle.
        self.faults = 0;
        Ok(())
    }

    /// Gate one requested duty: zero while tripped, otherwise clamped to
    /// `[0, max_duty]`.
    pub fn gate(&self, requested: f32) -> f32 {
        if self.is_tripped() {
            0.0
        } else {
            clamp_duty(requested, self.max_duty)
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.faults != 0
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// Check if a specific fault is latched.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    pub fn state(&self) -> SafetyState {
        SafetyState {
            state: if self.is_tripped() {
                SupervisorState::Tripped
            } else {
                SupervisorState::Armed
            },
            estop_active: self.has_fault(SafetyFault::EmergencyStop),
            last_vision_update_ms: self.last_vision_update_ms,
            locked_out: self.is_tripped(),
            faults: self.faults,
            stop_signal: self.stop_level,
        }
    }

    // ── Internal ──────────────────────────────────────────────────

    fn latch(&mut self, fault: SafetyFault) {
        if self.faults & fault.mask() == 0 {
            error!("SAFETY TRIP SET: {fault}");
        }
        self.faults |= fault.mask();
    }
}
