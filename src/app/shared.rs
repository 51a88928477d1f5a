//! Records shared between the vision task, the control task and external
//! readers, plus the command intake queue.
//!
//! Every record has exactly one writer and is copied in and out whole
//! under a critical section, so readers never see a torn update.
//!
//! ```text
//!  vision task ──FrothMetrics──▶ ┌─────────────┐ ──snapshot()──▶ dashboard
//!  control task ─ctrl/safety──▶  │ SharedState │
//!  dashboard ───submit(cmd)───▶  └─────────────┘ ──receive()──▶ command task
//! ```

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use serde::Serialize;

use super::commands::AppCommand;
use super::ports::CHANNEL_COUNT;
use crate::control::pi::ControllerState;
use crate::error::CommandError;
use crate::safety::SafetyState;
use crate::vision::metrics::FrothMetrics;

/// Pending commands accepted ahead of the command task.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

type Shared<T> = Mutex<CriticalSectionRawMutex, Cell<T>>;

/// Everything the control task publishes after a cycle or command.  One
/// cell, so a tripped safety state is never paired with pre-trip duties.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ControlRecord {
    controller: ControllerState,
    safety: SafetyState,
    duties: [f32; CHANNEL_COUNT],
}

pub struct SharedState {
    metrics: Shared<FrothMetrics>,
    control: Shared<ControlRecord>,
    commands: Channel<CriticalSectionRawMutex, AppCommand, COMMAND_QUEUE_DEPTH>,
}

impl SharedState {
    pub fn new(controller: ControllerState, safety: SafetyState) -> Self {
        Self {
            metrics: Mutex::new(Cell::new(FrothMetrics::default())),
            control: Mutex::new(Cell::new(ControlRecord {
                controller,
                safety,
                duties: [0.0; CHANNEL_COUNT],
            })),
            commands: Channel::new(),
        }
    }

    // ── Vision side ───────────────────────────────────────────

    pub fn publish_metrics(&self, metrics: FrothMetrics) {
        self.metrics.lock(|cell| cell.set(metrics));
    }

    pub fn metrics(&self) -> FrothMetrics {
        self.metrics.lock(Cell::get)
    }

    // ── Control side ──────────────────────────────────────────

    pub fn publish_control(
        &self,
        controller: ControllerState,
        safety: SafetyState,
        duties: [f32; CHANNEL_COUNT],
    ) {
        let record = ControlRecord {
            controller,
            safety,
            duties,
        };
        self.control.lock(|cell| cell.set(record));
    }

    /// Read-only export of every record.
    pub fn snapshot(&self) -> SystemSnapshot {
        let metrics = self.metrics();
        let control = self.control.lock(Cell::get);
        SystemSnapshot {
            metrics,
            controller: control.controller,
            safety: control.safety,
            duties: control.duties,
        }
    }

    // ── Command intake ────────────────────────────────────────

    /// Range-check and enqueue.  Never blocks; a full queue is reported.
    pub fn submit(&self, cmd: AppCommand) -> Result<(), CommandError> {
        cmd.validate()?;
        self.commands
            .try_send(cmd)
            .map_err(|_| CommandError::QueueFull)
    }

    /// Wait for the next queued command.
    pub async fn next_command(&self) -> AppCommand {
        self.commands.receive().await
    }

    pub fn try_next_command(&self) -> Option<AppCommand> {
        self.commands.try_receive().ok()
    }
}

/// Point-in-time copy of the exported records, in raw units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub metrics: FrothMetrics,
    pub controller: ControllerState,
    pub safety: SafetyState,
    pub duties: [f32; CHANNEL_COUNT],
}

/// Presentation form: fractions as percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    pub bubble_count: u32,
    pub avg_bubble_size: f32,
    pub size_std_dev: f32,
    pub froth_coverage_pct: f32,
    pub froth_stability_pct: f32,
    pub vision_ok: bool,
    pub metrics_timestamp_ms: u64,
    pub controller: ControllerState,
    pub safety: SafetyState,
    pub duties: [f32; CHANNEL_COUNT],
}

impl SystemSnapshot {
    pub fn report(&self) -> StatusReport {
        StatusReport {
            bubble_count: self.metrics.bubble_count,
            avg_bubble_size: self.metrics.avg_bubble_size,
            size_std_dev: self.metrics.size_std_dev,
            froth_coverage_pct: self.metrics.coverage_percent(),
            froth_stability_pct: self.metrics.stability_percent(),
            vision_ok: self.metrics.success,
            metrics_timestamp_ms: self.metrics.timestamp_ms,
            controller: self.controller,
            safety: self.safety,
            duties: self.duties,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.report())
    }
}
