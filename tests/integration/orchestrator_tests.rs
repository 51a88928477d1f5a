//! Full loop on the executor: both cadences plus the command intake.

use core::cell::RefCell;

use crate::mock_hw::{MockMotors, MockStop, RecordingSink};

use frothctl::adapters::camera::SyntheticFrothCamera;
use frothctl::adapters::time::MonotonicClock;
use frothctl::app::commands::AppCommand;
use frothctl::app::events::AppEvent;
use frothctl::app::ports::Clock;
use frothctl::app::shared::SharedState;
use frothctl::config::SystemConfig;
use frothctl::control::pi::ControlMode;
use frothctl::orchestrator::{self, ControlRig, VisionPipeline};

type Rig = ControlRig<MockMotors, MockStop, RecordingSink>;

fn fast_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.camera.frame_width = 160;
    config.camera.frame_height = 120;
    config.camera.retry_delay_ms = 0;
    config.timing.vision_interval_ms = 5;
    config.timing.control_interval_ms = 10;
    config.timing.telemetry_interval_secs = 0;
    config
}

fn setup(config: &SystemConfig, clock: &MonotonicClock, stop: bool) -> (RefCell<Rig>, SharedState) {
    let stop = MockStop {
        asserted: stop,
        samples: 0,
    };
    let rig = ControlRig::new(
        config,
        MockMotors::new(),
        stop,
        RecordingSink::new(),
        clock.now_ms(),
    );
    let shared = SharedState::new(rig.service.controller_state(), rig.service.safety_state());
    (RefCell::new(rig), shared)
}

fn pipeline(config: &SystemConfig) -> VisionPipeline<SyntheticFrothCamera> {
    let mut camera = SyntheticFrothCamera::new(160, 120, 9);
    camera.set_occupancy(1.0);
    VisionPipeline::new(camera, config)
}

#[test]
fn runs_requested_cycles_and_publishes_metrics() {
    let config = fast_config();
    let clock = MonotonicClock::new();
    let (rig, shared) = setup(&config, &clock, false);

    orchestrator::run(&config, pipeline(&config), &rig, &shared, &clock, Some(5));

    let rig = rig.into_inner();
    assert_eq!(rig.service.cycle_count(), 5);
    assert_eq!(rig.stop.samples, 5, "stop input sampled every cycle");

    let snap = shared.snapshot();
    assert!(snap.metrics.success);
    assert!(snap.metrics.bubble_count > 0);
    assert_eq!(snap.controller.mode, ControlMode::Manual);
    assert!(rig.motor.all_zero(), "manual start holds every output at zero");
}

#[test]
fn queued_mode_change_drives_reagent_pump() {
    let config = fast_config();
    let clock = MonotonicClock::new();
    let (rig, shared) = setup(&config, &clock, false);

    shared.submit(AppCommand::SetMode(ControlMode::Auto)).unwrap();
    orchestrator::run(&config, pipeline(&config), &rig, &shared, &clock, Some(5));

    let rig = rig.into_inner();
    assert_eq!(rig.service.mode(), ControlMode::Auto);
    assert_eq!(shared.snapshot().controller.mode, ControlMode::Auto);
    assert!(
        rig.sink.events.contains(&AppEvent::ModeChanged {
            from: ControlMode::Manual,
            to: ControlMode::Auto,
        })
    );
    assert!(rig.motor.max_written() <= config.control.max_duty);
}

#[test]
fn queued_estop_leaves_outputs_zero() {
    let config = fast_config();
    let clock = MonotonicClock::new();
    let (rig, shared) = setup(&config, &clock, false);

    shared.submit(AppCommand::SetMode(ControlMode::Auto)).unwrap();
    shared.submit(AppCommand::TriggerEstop).unwrap();
    orchestrator::run(&config, pipeline(&config), &rig, &shared, &clock, Some(4));

    let rig = rig.into_inner();
    assert!(rig.service.is_tripped());
    assert!(rig.motor.all_zero());
    assert!(shared.snapshot().safety.estop_active);
    assert_eq!(shared.snapshot().duties, [0.0; 4]);
}

#[test]
fn held_stop_input_trips_on_first_cycle() {
    let config = fast_config();
    let clock = MonotonicClock::new();
    let (rig, shared) = setup(&config, &clock, true);

    orchestrator::run(&config, pipeline(&config), &rig, &shared, &clock, Some(2));

    let rig = rig.into_inner();
    assert!(rig.service.is_tripped());
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::SafetyTripped(_))),
        1,
        "trip announced once"
    );
}

#[test]
fn reset_reads_stop_input_released_between_cycles() {
    let config = fast_config();
    let clock = MonotonicClock::new();
    let (rig, shared) = setup(&config, &clock, true);
    let mut rig = rig.into_inner();

    rig.cycle(&shared, clock.now_ms());
    assert!(rig.service.is_tripped());

    rig.stop.asserted = false;
    assert_eq!(rig.command(AppCommand::ResetEstop, &shared), Ok(()));
    assert!(!rig.service.is_tripped());
    assert_eq!(rig.stop.samples, 2, "reset samples the input once");
    assert!(!shared.snapshot().safety.estop_active);
}
