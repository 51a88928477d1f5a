//! PI controller for reagent dosing
//!
//! Proportional-integral controller holding the froth bubble count at a
//! target by modulating the reagent pump duty.  No derivative term.
//!
//! The integral accumulates raw count error once per control cycle (no
//! `dt` scaling), so `ki` is expressed per cycle.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app::commands::PiUpdate;
use crate::config::ControlConfig;
use crate::error::CommandError;

/// Absolute duty ceiling of the PWM hardware (percent).
pub const RAW_DUTY_CEILING: f32 = 100.0;

/// Reagent pump control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// PI loop drives the pump from the bubble count.
    Auto,
    /// Pump follows the operator-supplied duty.
    #[default]
    Manual,
}

/// Exported controller record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub mode: ControlMode,
    pub setpoint: f32,
    pub kp: f32,
    pub ki: f32,
    pub integral: f32,
    /// `None` until the first auto cycle after a mode change.
    pub last_error: Option<f32>,
    /// Last commanded duty, always within `[0, max_duty]`.
    pub output: f32,
}

/// Outcome of one auto-mode step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiStep {
    pub error: f32,
    /// Pre-clamp output.
    pub raw: f32,
    /// Clamped output.
    pub output: f32,
    /// True when `raw` fell outside `[0, max_duty]`.
    pub saturated: bool,
}

/// Dual-mode PI controller.
pub struct PiController {
    mode: ControlMode,
    kp: f32,
    ki: f32,
    setpoint: f32,
    integral: f32,
    last_error: Option<f32>,
    output: f32,
    max_duty: f32,
}

impl PiController {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            mode: config.initial_mode,
            kp: config.kp,
            ki: config.ki,
            setpoint: config.setpoint,
            integral: 0.0,
            last_error: None,
            output: 0.0,
            max_duty: config.max_duty.clamp(0.0, RAW_DUTY_CEILING),
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn max_duty(&self) -> f32 {
        self.max_duty
    }

    /// Switch mode.  Any actual transition discards the integral and the
    /// last error so nothing carries across.
    pub fn set_mode(&mut self, mode: ControlMode) -> bool {
        if mode == self.mode {
            return false;
        }
        info!("PI mode {:?} -> {:?} (integral reset)", self.mode, mode);
        self.mode = mode;
        self.reset();
        true
    }

    /// Apply a partial parameter update atomically: every field is
    /// checked before any is written.  A new setpoint restarts the
    /// integral so the old target's accumulation does not bump the pump.
    pub fn update_parameters(&mut self, update: PiUpdate) -> Result<(), CommandError> {
        update.validate()?;
        if let Some(kp) = update.kp {
            self.kp = kp;
        }
        if let Some(ki) = update.ki {
            self.ki = ki;
        }
        if let Some(sp) = update.setpoint {
            self.setpoint = sp;
            self.integral = 0.0;
        }
        info!(
            "PI updated: Kp={}, Ki={}, Setpoint={}",
            self.kp, self.ki, self.setpoint
        );
        Ok(())
    }

    /// Auto-mode step given the measured bubble count.
    pub fn compute(&mut self, measured: f32) -> PiStep {
        let error = self.setpoint - measured;

        self.integral += error;
        let raw = self.kp * error + self.ki * self.integral;

        // Anti-windup: roll back this step's accumulation when it pushes
        // further into saturation.
        let saturated_high = raw > self.max_duty;
        let saturated_low = raw < 0.0;
        if (saturated_high && error > 0.0) || (saturated_low && error < 0.0) {
            self.integral -= error;
        }

        let output = clamp_duty(raw, self.max_duty);
        self.last_error = Some(error);
        self.output = output;

        if saturated_high || saturated_low {
            debug!("PI saturated: raw={:.2} -> {:.2}", raw, output);
        }

        PiStep {
            error,
            raw,
            output,
            saturated: saturated_high || saturated_low,
        }
    }

    /// Manual-mode step: pass the operator value through the clamp.
    pub fn manual(&mut self, operator_duty: f32) -> f32 {
        self.output = clamp_duty(operator_duty, self.max_duty);
        self.output
    }

    /// Discard integral and error history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }

    /// Force the recorded output to zero (used on safety trip).
    pub fn zero_output(&mut self) {
        self.output = 0.0;
    }

    pub fn state(&self) -> ControllerState {
        ControllerState {
            mode: self.mode,
            setpoint: self.setpoint,
            kp: self.kp,
            ki: self.ki,
            integral: self.integral,
            last_error: self.last_error,
            output: self.output,
        }
    }
}

/// Clamp to `[0, min(max_duty, 100)]`; NaN maps to 0.
pub fn clamp_duty(value: f32, max_duty: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, RAW_DUTY_CEILING).min(max_duty)
}
