//! Control service, the hexagonal core of the actuation side.
//!
//! [`ControlService`] owns the PI controller, the safety supervisor and
//! the operator duty table.  It exposes a hardware-agnostic API; all I/O
//! flows through port traits injected at call sites, so the whole loop is
//! testable with mock adapters.
//!
//! ```text
//!  FrothMetrics ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!  stop level   ──▶ │     ControlService       │
//!                   │  PI · Safety · duties    │ ──▶ MotorOutputPort
//!  AppCommand   ──▶ └─────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::control::pi::{ControlMode, ControllerState, PiController};
use crate::error::{CommandError, SafetyFault};
use crate::safety::{SafetyState, SafetySupervisor};
use crate::vision::metrics::FrothMetrics;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{CHANNEL_COUNT, ChannelId, EventSink, MotorOutputPort};

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService {
    pi: PiController,
    safety: SafetySupervisor,
    /// Operator duty per channel.  The reagent entry is used in manual
    /// mode only.
    manual_duty: [f32; CHANNEL_COUNT],
    /// Duties actually written on the last cycle (post-gate).
    applied: [f32; CHANNEL_COUNT],
    metrics: FrothMetrics,
    cycle_count: u64,
    was_tripped: bool,
    was_saturated: bool,
    vision_ok: bool,
}

impl ControlService {
    /// `now_ms` seeds the vision watchdog.
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        Self {
            pi: PiController::new(&config.control),
            safety: SafetySupervisor::new(config, now_ms),
            manual_duty: [0.0; CHANNEL_COUNT],
            applied: [0.0; CHANNEL_COUNT],
            metrics: FrothMetrics::default(),
            cycle_count: 0,
            was_tripped: false,
            was_saturated: false,
            vision_ok: true,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive every output to zero and announce the initial mode.
    pub fn start(&mut self, motor: &mut impl MotorOutputPort, sink: &mut impl EventSink) {
        self.write_all(motor, [0.0; CHANNEL_COUNT]);
        sink.emit(&AppEvent::Started(self.pi.mode()));
        info!("ControlService started in {:?} mode", self.pi.mode());
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one control cycle: PI → safety → gate → motor outputs.
    /// Returns the duties written.
    pub fn control_cycle(
        &mut self,
        metrics: &FrothMetrics,
        stop_asserted: bool,
        now_ms: u64,
        motor: &mut impl MotorOutputPort,
        sink: &mut impl EventSink,
    ) -> [f32; CHANNEL_COUNT] {
        self.cycle_count += 1;
        self.metrics = *metrics;
        self.safety.observe_metrics(metrics);
        self.track_vision(metrics, sink);

        // 1. Requested duties
        let mut requested = self.manual_duty;
        let reagent = ChannelId::ReagentPump.index();
        requested[reagent] = match self.pi.mode() {
            ControlMode::Auto => {
                let step = self.pi.compute(metrics.bubble_count as f32);
                if step.saturated && !self.was_saturated {
                    sink.emit(&AppEvent::Saturated {
                        raw: step.raw,
                        output: step.output,
                    });
                }
                self.was_saturated = step.saturated;
                step.output
            }
            ControlMode::Manual => self.pi.manual(self.manual_duty[reagent]),
        };

        // 2. Safety evaluation
        let faults = self.safety.evaluate(stop_asserted, self.pi.mode(), now_ms);
        if faults != 0 {
            if !self.was_tripped {
                warn!("Safety fault! flags=0b{:08b}", faults);
                self.on_trip(sink);
            }
            self.pi.reset();
            self.pi.zero_output();
        }

        // 3. Gate and apply
        let gated = requested.map(|d| self.safety.gate(d));
        self.write_all(motor, gated);
        gated
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one external command between cycles.  Rejections are logged
    /// and emitted as [`AppEvent::CommandRejected`].
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        motor: &mut impl MotorOutputPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let result = self.apply_command(cmd, motor, sink);
        if let Err(e) = result {
            warn!("Command {:?} rejected: {}", cmd, e);
            sink.emit(&AppEvent::CommandRejected(e));
        }
        result
    }

    fn apply_command(
        &mut self,
        cmd: AppCommand,
        motor: &mut impl MotorOutputPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        cmd.validate()?;
        match cmd {
            AppCommand::SetMode(mode) => {
                let from = self.pi.mode();
                if self.pi.set_mode(mode) {
                    self.was_saturated = false;
                    sink.emit(&AppEvent::ModeChanged { from, to: mode });
                }
            }
            AppCommand::SetPiParameters(update) => {
                self.pi.update_parameters(update)?;
            }
            AppCommand::SetManualDuty { channel, percent } => {
                if self.safety.is_tripped() {
                    return Err(CommandError::SafetyLocked);
                }
                self.manual_duty[channel.index()] = self.safety.gate(percent);
                info!(
                    "Manual duty {} = {:.1}%",
                    channel,
                    self.manual_duty[channel.index()]
                );
            }
            AppCommand::StopAll => {
                self.manual_duty = [0.0; CHANNEL_COUNT];
                let mut duties = [0.0; CHANNEL_COUNT];
                if self.pi.mode() == ControlMode::Auto && !self.safety.is_tripped() {
                    let reagent = ChannelId::ReagentPump.index();
                    duties[reagent] = self.applied[reagent];
                }
                self.write_all(motor, duties);
                info!("All manual outputs stopped");
            }
            AppCommand::TriggerEstop => {
                self.safety.trigger(SafetyFault::EmergencyStop);
                if !self.was_tripped {
                    self.on_trip(sink);
                }
                self.pi.reset();
                self.pi.zero_output();
                self.write_all(motor, [0.0; CHANNEL_COUNT]);
            }
            AppCommand::ResetEstop => {
                self.safety.reset()?;
                if self.was_tripped {
                    self.was_tripped = false;
                    sink.emit(&AppEvent::SafetyReset);
                }
            }
        }
        Ok(())
    }

    /// Sample the stop input between cycles, ahead of a reset.
    pub fn observe_stop(&mut self, stop_asserted: bool) {
        self.safety.sample_stop(stop_asserted);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        let ctrl = self.pi.state();
        TelemetryData {
            mode: ctrl.mode,
            bubble_count: self.metrics.bubble_count,
            avg_bubble_size: self.metrics.avg_bubble_size,
            froth_coverage: self.metrics.froth_coverage,
            froth_stability: self.metrics.froth_stability,
            vision_ok: self.vision_ok,
            setpoint: ctrl.setpoint,
            integral: ctrl.integral,
            duties: self.applied,
            fault_flags: self.safety.faults(),
            cycle_count: self.cycle_count,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.pi.mode()
    }

    pub fn controller_state(&self) -> ControllerState {
        self.pi.state()
    }

    pub fn safety_state(&self) -> SafetyState {
        self.safety.state()
    }

    /// Duties written on the last cycle or command.
    pub fn applied_duties(&self) -> [f32; CHANNEL_COUNT] {
        self.applied
    }

    pub fn manual_duties(&self) -> [f32; CHANNEL_COUNT] {
        self.manual_duty
    }

    pub fn is_tripped(&self) -> bool {
        self.safety.is_tripped()
    }

    /// Control cycles executed since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    // ── Internal ──────────────────────────────────────────────

    /// Trip edge: nothing stored may resume motion after a reset.
    fn on_trip(&mut self, sink: &mut impl EventSink) {
        self.was_tripped = true;
        self.manual_duty = [0.0; CHANNEL_COUNT];
        sink.emit(&AppEvent::SafetyTripped(self.safety.faults()));
    }

    fn track_vision(&mut self, metrics: &FrothMetrics, sink: &mut impl EventSink) {
        // The initial record has never been written by the vision task.
        if !metrics.success && metrics.timestamp_ms == 0 {
            return;
        }
        let success = metrics.success;
        if success == self.vision_ok {
            return;
        }
        self.vision_ok = success;
        sink.emit(if success {
            &AppEvent::VisionRestored
        } else {
            &AppEvent::VisionDegraded
        });
    }

    fn write_all(&mut self, motor: &mut impl MotorOutputPort, duties: [f32; CHANNEL_COUNT]) {
        for ch in ChannelId::ALL {
            let duty = duties[ch.index()];
            if let Err(e) = motor.set_duty(ch, duty) {
                warn!("Motor write {} = {:.1}% failed: {}", ch, duty, e);
            }
        }
        self.applied = duties;
    }
}
