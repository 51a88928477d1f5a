//! Motor output adapters.
//!
//! [`PwmMotorOutput`] drives one `embedded-hal` PWM channel per motor.
//! [`SimMotorOutput`] tracks duties in memory for bench runs.
//!
//! Both are dumb actuators: saturation and lockout are enforced upstream
//! by the safety supervisor.  They still saturate to 0–100 % so a stray
//! value can never wrap the hardware register.

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, info};

use crate::app::ports::{CHANNEL_COUNT, ChannelId, MotorError, MotorOutputPort};

/// PWM resolution used for duty writes (parts per thousand).
const DUTY_RESOLUTION: u16 = 1000;

fn to_permille(percent: f32) -> u16 {
    if percent.is_nan() {
        return 0;
    }
    (percent.clamp(0.0, 100.0) * 10.0).round() as u16
}

/// Hardware adapter: one PWM channel per motor, `None` where unwired.
pub struct PwmMotorOutput<P: SetDutyCycle> {
    channels: [Option<P>; CHANNEL_COUNT],
}

impl<P: SetDutyCycle> PwmMotorOutput<P> {
    pub fn new(channels: [Option<P>; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    /// Release the PWM channels.
    pub fn into_inner(self) -> [Option<P>; CHANNEL_COUNT] {
        self.channels
    }
}

impl<P: SetDutyCycle> MotorOutputPort for PwmMotorOutput<P> {
    fn set_duty(&mut self, channel: ChannelId, percent: f32) -> Result<(), MotorError> {
        let pin = self.channels[channel.index()]
            .as_mut()
            .ok_or(MotorError::ChannelUnavailable)?;
        pin.set_duty_cycle_fraction(to_permille(percent), DUTY_RESOLUTION)
            .map_err(|_| MotorError::PwmWriteFailed)
    }
}

/// In-memory motor bank.  Logs every change of duty.
#[derive(Debug, Default)]
pub struct SimMotorOutput {
    duty: [f32; CHANNEL_COUNT],
    writes: u64,
}

impl SimMotorOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duty(&self, channel: ChannelId) -> f32 {
        self.duty[channel.index()]
    }

    pub fn duties(&self) -> [f32; CHANNEL_COUNT] {
        self.duty
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl MotorOutputPort for SimMotorOutput {
    fn set_duty(&mut self, channel: ChannelId, percent: f32) -> Result<(), MotorError> {
        let duty = to_permille(percent) as f32 / 10.0;
        let slot = &mut self.duty[channel.index()];
        if (*slot - duty).abs() > f32::EPSILON {
            info!("MOTOR | {} {:.1}% -> {:.1}%", channel, *slot, duty);
        } else {
            debug!("MOTOR | {} hold {:.1}%", channel, duty);
        }
        *slot = duty;
        self.writes += 1;
        Ok(())
    }
}
