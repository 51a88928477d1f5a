//! Inbound commands to the control service.
//!
//! These represent actions requested by the outside world (operator
//! dashboard transport, stop buttons, scripts) that the
//! [`ControlService`](super::service::ControlService) interprets and acts
//! upon between control cycles.

use serde::{Deserialize, Serialize};

use super::ports::ChannelId;
use crate::control::pi::ControlMode;
use crate::error::CommandError;

/// Partial PI parameter update; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PiUpdate {
    pub kp: Option<f32>,
    pub ki: Option<f32>,
    pub setpoint: Option<f32>,
}

impl PiUpdate {
    /// Type/range check.  Gains only need to be finite (operator
    /// responsibility); the setpoint must be non-negative.
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.kp.is_some_and(|kp| !kp.is_finite()) {
            return Err(CommandError::OutOfRange("kp"));
        }
        if self.ki.is_some_and(|ki| !ki.is_finite()) {
            return Err(CommandError::OutOfRange("ki"));
        }
        if self.setpoint.is_some_and(|sp| !(sp.is_finite() && sp >= 0.0)) {
            return Err(CommandError::OutOfRange("setpoint"));
        }
        Ok(())
    }
}

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppCommand {
    /// Switch the reagent pump between PI and operator control.
    SetMode(ControlMode),

    /// Update any subset of kp / ki / setpoint.
    SetPiParameters(PiUpdate),

    /// Operator duty for one channel (percent 0–100).
    SetManualDuty { channel: ChannelId, percent: f32 },

    /// Zero every manual duty (non-emergency stop; mode unchanged).
    StopAll,

    /// Latch the safety supervisor into `Tripped`.
    TriggerEstop,

    /// Clear the safety latch.
    ResetEstop,
}

impl AppCommand {
    /// Stateless range check, run before a command is queued.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Self::SetPiParameters(update) => update.validate(),
            Self::SetManualDuty { percent, .. } => {
                if percent.is_finite() && (0.0..=100.0).contains(percent) {
                    Ok(())
                } else {
                    Err(CommandError::OutOfRange("duty"))
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_gains_are_accepted() {
        let cmd = AppCommand::SetPiParameters(PiUpdate {
            kp: Some(-2.0),
            ki: Some(-0.1),
            setpoint: None,
        });
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn negative_setpoint_is_rejected() {
        let cmd = AppCommand::SetPiParameters(PiUpdate {
            setpoint: Some(-5.0),
            ..PiUpdate::default()
        });
        assert_eq!(cmd.validate(), Err(CommandError::OutOfRange("setpoint")));
    }

    #[test]
    fn nan_gain_is_rejected() {
        let update = PiUpdate {
            kp: Some(f32::NAN),
            ..PiUpdate::default()
        };
        assert_eq!(update.validate(), Err(CommandError::OutOfRange("kp")));
    }

    #[test]
    fn manual_duty_range_checked() {
        let ok = AppCommand::SetManualDuty {
            channel: ChannelId::Agitator,
            percent: 100.0,
        };
        let bad = AppCommand::SetManualDuty {
            channel: ChannelId::Agitator,
            percent: 100.5,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(bad.validate(), Err(CommandError::OutOfRange("duty")));
    }

    #[test]
    fn commands_deserialize_from_json() {
        let cmd: AppCommand =
            serde_json::from_str(r#"{ "set_pi_parameters": { "kp": 0.8, "ki": null, "setpoint": 100.0 } }"#)
                .unwrap();
        assert_eq!(
            cmd,
            AppCommand::SetPiParameters(PiUpdate {
                kp: Some(0.8),
                ki: None,
                setpoint: Some(100.0),
            })
        );
        let cmd: AppCommand = serde_json::from_str(r#""trigger_estop""#).unwrap();
        assert_eq!(cmd, AppCommand::TriggerEstop);
    }
}
