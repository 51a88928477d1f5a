//! Control orchestrator: the two cadences and the command intake.
//!
//! Runs three cooperative tasks on one `edge-executor`:
//!
//! 1. **Vision**: Frame Source → Segmenter → Aggregator, publishes a
//!    fresh [`FrothMetrics`] snapshot every `vision_interval_ms`
//! 2. **Control**: reads the latest snapshot, runs PI then Safety and
//!    writes the motor outputs every `control_interval_ms`
//! 3. **Commands**: wakes on [`SharedState::submit`] and applies the
//!    command between control cycles
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  futures_lite::block_on                                  │
//!  │  ┌────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                      │  │
//!  │  │  ┌──────────┐   ┌───────────┐   ┌───────────────┐  │  │
//!  │  │  │ Vision   │   │ Control   │   │ Commands      │  │  │
//!  │  │  │ 500ms ⏱  │   │ 1000ms ⏱  │   │ wake-on-send  │  │  │
//!  │  │  └────┬─────┘   └─────▲─────┘   └───────────────┘  │  │
//!  │  │       └─ SharedState ─┘                            │  │
//!  │  └────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each cycle body is synchronous, so a cycle in progress always
//! completes before another task runs.

use core::cell::RefCell;
use core::time::Duration;

use log::{info, warn};

use crate::app::commands::AppCommand;
use crate::app::events::AppEvent;
use crate::app::ports::{
    CHANNEL_COUNT, CameraPort, Clock, EventSink, MotorOutputPort, StopSignalPort,
};
use crate::app::service::ControlService;
use crate::app::shared::SharedState;
use crate::config::SystemConfig;
use crate::error::CommandError;
use crate::vision::frame::{FrameSource, RetryPolicy};
use crate::vision::metrics::{FrothMetrics, MetricsAggregator};
use crate::vision::segment::Segmenter;

// ───────────────────────────────────────────────────────────────
// Vision pipeline
// ───────────────────────────────────────────────────────────────

/// Frame Source → Segmenter → Aggregator.
pub struct VisionPipeline<C: CameraPort> {
    source: FrameSource<C>,
    segmenter: Segmenter,
    aggregator: MetricsAggregator,
}

impl<C: CameraPort> VisionPipeline<C> {
    pub fn new(camera: C, config: &SystemConfig) -> Self {
        Self {
            source: FrameSource::new(camera, RetryPolicy::from_config(&config.camera)),
            segmenter: Segmenter::new(&config.vision),
            aggregator: MetricsAggregator::new(&config.metrics),
        }
    }

    /// One vision cycle.  Never fails: a dead camera yields the previous
    /// values with `success = false`.
    pub async fn run_cycle(&mut self, clock: &impl Clock) -> FrothMetrics {
        match self.source.acquire(|| clock.now_ms()).await {
            Ok(frame) => {
                let seg = self.segmenter.segment(&frame);
                self.aggregator.aggregate(&seg, frame.captured_at_ms)
            }
            Err(e) => {
                warn!("Vision cycle failed: camera unavailable ({})", e);
                self.aggregator.fail(clock.now_ms())
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Control rig
// ───────────────────────────────────────────────────────────────

/// The control service together with the adapters it drives.
pub struct ControlRig<M, S, E> {
    pub service: ControlService,
    pub motor: M,
    pub stop: S,
    pub sink: E,
    telemetry_interval_ms: u64,
    last_telemetry_ms: u64,
}

impl<M: MotorOutputPort, S: StopSignalPort, E: EventSink> ControlRig<M, S, E> {
    /// Builds the service, zeroes every output and announces the start.
    pub fn new(config: &SystemConfig, motor: M, stop: S, sink: E, now_ms: u64) -> Self {
        let mut rig = Self {
            service: ControlService::new(config, now_ms),
            motor,
            stop,
            sink,
            telemetry_interval_ms: config.timing.telemetry_interval_secs as u64 * 1000,
            last_telemetry_ms: now_ms,
        };
        rig.service.start(&mut rig.motor, &mut rig.sink);
        rig
    }

    /// One control cycle against the latest published metrics.  The stop
    /// input is sampled here, before any output is written.
    pub fn cycle(&mut self, shared: &SharedState, now_ms: u64) -> [f32; CHANNEL_COUNT] {
        let metrics = shared.metrics();
        let stop = self.stop.is_asserted();
        let duties =
            self.service
                .control_cycle(&metrics, stop, now_ms, &mut self.motor, &mut self.sink);

        if self.telemetry_interval_ms > 0
            && now_ms.saturating_sub(self.last_telemetry_ms) >= self.telemetry_interval_ms
        {
            self.last_telemetry_ms = now_ms;
            self.sink
                .emit(&AppEvent::Telemetry(self.service.build_telemetry()));
        }

        self.publish(shared);
        duties
    }

    /// Apply one command and republish the records it may have changed.
    /// A reset re-reads the stop input first.
    pub fn command(&mut self, cmd: AppCommand, shared: &SharedState) -> Result<(), CommandError> {
        if cmd == AppCommand::ResetEstop {
            self.service.observe_stop(self.stop.is_asserted());
        }
        let result = self
            .service
            .handle_command(cmd, &mut self.motor, &mut self.sink);
        self.publish(shared);
        result
    }

    pub fn publish(&self, shared: &SharedState) {
        shared.publish_control(
            self.service.controller_state(),
            self.service.safety_state(),
            self.service.applied_duties(),
        );
    }
}

// ───────────────────────────────────────────────────────────────
// Tasks
// ───────────────────────────────────────────────────────────────

/// Vision cadence.  Runs until the executor is dropped.
pub async fn vision_task<C: CameraPort, K: Clock>(
    mut pipeline: VisionPipeline<C>,
    shared: &SharedState,
    clock: &K,
    period: Duration,
) {
    loop {
        let metrics = pipeline.run_cycle(clock).await;
        shared.publish_metrics(metrics);
        async_io_mini::Timer::after(period).await;
    }
}

/// Control cadence.  Returns after `max_cycles` cycles when given.
pub async fn control_task<M, S, E, K>(
    rig: &RefCell<ControlRig<M, S, E>>,
    shared: &SharedState,
    clock: &K,
    period: Duration,
    max_cycles: Option<u64>,
) where
    M: MotorOutputPort,
    S: StopSignalPort,
    E: EventSink,
    K: Clock,
{
    let mut cycles = 0u64;
    loop {
        rig.borrow_mut().cycle(shared, clock.now_ms());
        cycles += 1;
        if max_cycles.is_some_and(|max| cycles >= max) {
            return;
        }
        async_io_mini::Timer::after(period).await;
    }
}

/// Command intake.  Wakes instantly on submit; no polling.
pub async fn command_task<M, S, E>(rig: &RefCell<ControlRig<M, S, E>>, shared: &SharedState)
where
    M: MotorOutputPort,
    S: StopSignalPort,
    E: EventSink,
{
    loop {
        let cmd = shared.next_command().await;
        // Rejections are already logged and emitted by the service.
        let _ = rig.borrow_mut().command(cmd, shared);
    }
}

// ───────────────────────────────────────────────────────────────
// Entry point
// ───────────────────────────────────────────────────────────────

/// Spawn the three tasks and drive them until the control task returns
/// (never, when `max_cycles` is `None`).
pub fn run<C, M, S, E, K>(
    config: &SystemConfig,
    pipeline: VisionPipeline<C>,
    rig: &RefCell<ControlRig<M, S, E>>,
    shared: &SharedState,
    clock: &K,
    max_cycles: Option<u64>,
) where
    C: CameraPort,
    M: MotorOutputPort,
    S: StopSignalPort,
    E: EventSink,
    K: Clock,
{
    let vision_period = Duration::from_millis(config.timing.vision_interval_ms as u64);
    let control_period = Duration::from_millis(config.timing.control_interval_ms as u64);

    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    executor
        .spawn(vision_task(pipeline, shared, clock, vision_period))
        .detach();
    executor.spawn(command_task(rig, shared)).detach();

    info!(
        "Orchestrator started (vision {:?}, control {:?})",
        vision_period, control_period
    );

    futures_lite::future::block_on(executor.run(control_task(
        rig,
        shared,
        clock,
        control_period,
        max_cycles,
    )));
}
