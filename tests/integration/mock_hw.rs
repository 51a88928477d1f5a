//! Mock plant adapters for integration tests.
//!
//! Records every motor write and every emitted event so tests can assert
//! on the full command history without a camera or PWM hardware.

use std::cell::Cell;
use std::collections::VecDeque;

use frothctl::app::events::AppEvent;
use frothctl::app::ports::{
    CHANNEL_COUNT, CameraPort, CaptureError, ChannelId, Clock, EventSink, MotorError,
    MotorOutputPort, StopSignalPort,
};
use frothctl::vision::frame::Frame;

// ── Motor call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorCall {
    pub channel: ChannelId,
    pub duty: f32,
}

// ── MockMotors ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockMotors {
    pub calls: Vec<MotorCall>,
}

#[allow(dead_code)]
impl MockMotors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last duty written to `channel` (0 if never written).
    pub fn duty(&self, channel: ChannelId) -> f32 {
        self.calls
            .iter()
            .rev()
            .find(|c| c.channel == channel)
            .map_or(0.0, |c| c.duty)
    }

    pub fn duties(&self) -> [f32; CHANNEL_COUNT] {
        ChannelId::ALL.map(|ch| self.duty(ch))
    }

    pub fn all_zero(&self) -> bool {
        self.duties().iter().all(|&d| d == 0.0)
    }

    pub fn max_written(&self) -> f32 {
        self.calls.iter().map(|c| c.duty).fold(0.0, f32::max)
    }
}

impl MotorOutputPort for MockMotors {
    fn set_duty(&mut self, channel: ChannelId, percent: f32) -> Result<(), MotorError> {
        self.calls.push(MotorCall {
            channel,
            duty: percent,
        });
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockStop ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStop {
    pub asserted: bool,
    pub samples: u32,
}

impl StopSignalPort for MockStop {
    fn is_asserted(&mut self) -> bool {
        self.samples += 1;
        self.asserted
    }
}

// ── ManualClock ───────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn at(ms: u64) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// ── ScriptedCamera ────────────────────────────────────────────

/// Plays back a fixed script of grab outcomes, then fails forever.
pub struct ScriptedCamera {
    pub script: VecDeque<Result<image::GrayImage, CaptureError>>,
    pub grabs: u32,
}

#[allow(dead_code)]
impl ScriptedCamera {
    pub fn new(script: impl IntoIterator<Item = Result<image::GrayImage, CaptureError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            grabs: 0,
        }
    }
}

impl CameraPort for ScriptedCamera {
    fn grab(&mut self, now_ms: u64) -> Result<Frame, CaptureError> {
        self.grabs += 1;
        match self.script.pop_front() {
            Some(Ok(img)) => Ok(Frame::gray(img, now_ms)),
            Some(Err(e)) => Err(e),
            None => Err(CaptureError::DeviceUnavailable),
        }
    }
}
