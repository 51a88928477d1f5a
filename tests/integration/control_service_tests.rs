//! Integration tests for the ControlService → safety gate → motor chain.
//!
//! Every test drives the service with hand-built metrics snapshots and a
//! recording motor bank, then asserts on what actually reached the
//! outputs.

use crate::mock_hw::{MockMotors, RecordingSink};

use frothctl::app::commands::{AppCommand, PiUpdate};
use frothctl::app::events::AppEvent;
use frothctl::app::ports::ChannelId;
use frothctl::app::service::ControlService;
use frothctl::config::SystemConfig;
use frothctl::control::pi::ControlMode;
use frothctl::error::{CommandError, SafetyFault};
use frothctl::safety::SupervisorState;
use frothctl::vision::metrics::FrothMetrics;

const REAGENT: ChannelId = ChannelId::ReagentPump;

fn fresh(count: u32, ts: u64) -> FrothMetrics {
    FrothMetrics {
        bubble_count: count,
        timestamp_ms: ts,
        success: true,
        ..FrothMetrics::default()
    }
}

fn make_service(mode: ControlMode) -> (ControlService, MockMotors, RecordingSink) {
    let mut config = SystemConfig::default();
    config.control.initial_mode = mode;
    let mut svc = ControlService::new(&config, 0);
    let mut motors = MockMotors::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut motors, &mut sink);
    (svc, motors, sink)
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn starts_manual_with_all_outputs_zero() {
    let (svc, motors, sink) = make_service(ControlMode::Manual);
    assert_eq!(svc.mode(), ControlMode::Manual);
    assert!(motors.all_zero());
    assert_eq!(motors.calls.len(), 4, "every channel written once");
    assert_eq!(sink.events, vec![AppEvent::Started(ControlMode::Manual)]);
}

// ── PI reference scenario ─────────────────────────────────────

#[test]
fn auto_mode_reference_output() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    svc.control_cycle(&fresh(80, 500), false, 1000, &mut motors, &mut sink);
    assert!((motors.duty(REAGENT) - 22.0).abs() < 1e-4);
    let ctrl = svc.controller_state();
    assert!((ctrl.integral - 40.0).abs() < 1e-4);
    assert_eq!(ctrl.last_error, Some(40.0));
}

#[test]
fn output_never_exceeds_max_duty() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    for i in 1..=100u64 {
        svc.control_cycle(&fresh(0, i * 1000), false, i * 1000, &mut motors, &mut sink);
    }
    assert!(motors.max_written() <= 80.0);
    assert_eq!(motors.duty(REAGENT), 80.0);
}

#[test]
fn auxiliary_channels_follow_operator_in_auto() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    svc.handle_command(
        AppCommand::SetManualDuty {
            channel: ChannelId::Agitator,
            percent: 35.0,
        },
        &mut motors,
        &mut sink,
    )
    .unwrap();
    svc.control_cycle(&fresh(80, 500), false, 1000, &mut motors, &mut sink);
    assert_eq!(motors.duty(ChannelId::Agitator), 35.0);
    assert!((motors.duty(REAGENT) - 22.0).abs() < 1e-4);
}

// ── Manual mode ───────────────────────────────────────────────

#[test]
fn manual_duty_capped_by_max_duty() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Manual);
    svc.handle_command(
        AppCommand::SetManualDuty {
            channel: REAGENT,
            percent: 95.0,
        },
        &mut motors,
        &mut sink,
    )
    .unwrap();
    svc.control_cycle(&fresh(10, 500), false, 1000, &mut motors, &mut sink);
    assert_eq!(motors.duty(REAGENT), 80.0);
}

#[test]
fn out_of_range_duty_rejected_and_reported() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Manual);
    let res = svc.handle_command(
        AppCommand::SetManualDuty {
            channel: ChannelId::FeedPump,
            percent: 101.0,
        },
        &mut motors,
        &mut sink,
    );
    assert_eq!(res, Err(CommandError::OutOfRange("duty")));
    assert!(
        sink.events
            .contains(&AppEvent::CommandRejected(CommandError::OutOfRange("duty")))
    );
    assert_eq!(svc.manual_duties()[ChannelId::FeedPump.index()], 0.0);
}

#[test]
fn stop_all_zeroes_manual_outputs_only() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Manual);
    for ch in ChannelId::ALL {
        svc.handle_command(
            AppCommand::SetManualDuty {
                channel: ch,
                percent: 50.0,
            },
            &mut motors,
            &mut sink,
        )
        .unwrap();
    }
    svc.control_cycle(&fresh(10, 500), false, 1000, &mut motors, &mut sink);
    assert_eq!(motors.duties(), [50.0; 4]);
    svc.handle_command(AppCommand::StopAll, &mut motors, &mut sink)
        .unwrap();
    assert!(motors.all_zero());
    assert_eq!(svc.mode(), ControlMode::Manual);
    assert!(!svc.is_tripped());
}

// ── Mode transitions ──────────────────────────────────────────

#[test]
fn mode_switch_discards_integral() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    for i in 1..=5u64 {
        svc.control_cycle(&fresh(80, i * 1000), false, i * 1000, &mut motors, &mut sink);
    }
    assert!(svc.controller_state().integral > 0.0);

    svc.handle_command(AppCommand::SetMode(ControlMode::Manual), &mut motors, &mut sink)
        .unwrap();
    svc.handle_command(AppCommand::SetMode(ControlMode::Auto), &mut motors, &mut sink)
        .unwrap();
    assert_eq!(svc.controller_state().integral, 0.0);
    assert_eq!(svc.controller_state().last_error, None);

    // First auto cycle after the round trip behaves like a fresh start.
    svc.control_cycle(&fresh(80, 6000), false, 6000, &mut motors, &mut sink);
    assert!((motors.duty(REAGENT) - 22.0).abs() < 1e-4);

    let changes = sink.count(|e| matches!(e, AppEvent::ModeChanged { .. }));
    assert_eq!(changes, 2);
}

#[test]
fn partial_parameter_update_is_atomic() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    let res = svc.handle_command(
        AppCommand::SetPiParameters(PiUpdate {
            kp: Some(1.0),
            ki: None,
            setpoint: Some(-10.0),
        }),
        &mut motors,
        &mut sink,
    );
    assert_eq!(res, Err(CommandError::OutOfRange("setpoint")));
    assert_eq!(svc.controller_state().kp, 0.5, "nothing applied");

    svc.handle_command(
        AppCommand::SetPiParameters(PiUpdate {
            setpoint: Some(100.0),
            ..PiUpdate::default()
        }),
        &mut motors,
        &mut sink,
    )
    .unwrap();
    let ctrl = svc.controller_state();
    assert_eq!(ctrl.setpoint, 100.0);
    assert_eq!(ctrl.kp, 0.5);
    assert_eq!(ctrl.ki, 0.05);
}

// ── Emergency stop ────────────────────────────────────────────

#[test]
fn external_stop_zeroes_outputs_in_same_cycle() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    svc.control_cycle(&fresh(80, 500), false, 1000, &mut motors, &mut sink);
    assert!(motors.duty(REAGENT) > 0.0);

    let duties = svc.control_cycle(&fresh(80, 1500), true, 2000, &mut motors, &mut sink);
    assert_eq!(duties, [0.0; 4]);
    assert!(motors.all_zero());
    assert!(svc.safety_state().estop_active);
    assert!(
        sink.events
            .contains(&AppEvent::SafetyTripped(SafetyFault::EmergencyStop.mask()))
    );
}

#[test]
fn estop_latches_until_explicit_reset() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    svc.control_cycle(&fresh(80, 500), true, 1000, &mut motors, &mut sink);

    // Signal released: still locked out.
    for i in 2..=4u64 {
        svc.control_cycle(&fresh(80, i * 1000), false, i * 1000, &mut motors, &mut sink);
        assert!(motors.all_zero());
    }
    assert_eq!(svc.safety_state().state, SupervisorState::Tripped);

    svc.handle_command(AppCommand::ResetEstop, &mut motors, &mut sink)
        .unwrap();
    svc.control_cycle(&fresh(80, 5000), false, 5000, &mut motors, &mut sink);
    assert!((motors.duty(REAGENT) - 22.0).abs() < 1e-4, "integral was reset on trip");
    assert!(sink.events.contains(&AppEvent::SafetyReset));
}

#[test]
fn reset_refused_while_stop_held() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Manual);
    svc.control_cycle(&fresh(0, 500), true, 1000, &mut motors, &mut sink);
    let res = svc.handle_command(AppCommand::ResetEstop, &mut motors, &mut sink);
    assert_eq!(res, Err(CommandError::StopSignalAsserted));
    assert!(svc.is_tripped());
}

#[test]
fn commands_locked_out_while_tripped() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Manual);
    svc.handle_command(AppCommand::TriggerEstop, &mut motors, &mut sink)
        .unwrap();
    let res = svc.handle_command(
        AppCommand::SetManualDuty {
            channel: REAGENT,
            percent: 30.0,
        },
        &mut motors,
        &mut sink,
    );
    assert_eq!(res, Err(CommandError::SafetyLocked));

    // Reset does not resume the duties stored before the trip.
    svc.handle_command(AppCommand::ResetEstop, &mut motors, &mut sink)
        .unwrap();
    svc.control_cycle(&fresh(0, 500), false, 1000, &mut motors, &mut sink);
    assert!(motors.all_zero());
}

#[test]
fn metrics_keep_reporting_during_trip() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    svc.handle_command(AppCommand::TriggerEstop, &mut motors, &mut sink)
        .unwrap();
    svc.control_cycle(&fresh(137, 500), false, 1000, &mut motors, &mut sink);
    assert_eq!(svc.build_telemetry().bubble_count, 137);
    assert_eq!(svc.build_telemetry().duties, [0.0; 4]);
}

// ── Vision watchdog ───────────────────────────────────────────

#[test]
fn watchdog_trips_on_stale_metrics_in_auto() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    let last_good = fresh(80, 1000);
    for now in (2000..=6000).step_by(1000) {
        svc.control_cycle(&last_good, false, now, &mut motors, &mut sink);
        assert!(!svc.is_tripped(), "tripped early at {now}");
    }
    // 6001 ms since the last good update > 5000 ms bound.
    svc.control_cycle(&last_good, false, 7001, &mut motors, &mut sink);
    assert!(svc.is_tripped());
    assert!(motors.all_zero());
    assert!(
        sink.events
            .contains(&AppEvent::SafetyTripped(SafetyFault::WatchdogTimeout.mask()))
    );
}

#[test]
fn failed_vision_cycles_do_not_feed_watchdog() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Auto);
    svc.control_cycle(&fresh(80, 1000), false, 1000, &mut motors, &mut sink);
    let mut failed = fresh(80, 0);
    failed.success = false;
    for now in (2000..=7000).step_by(1000) {
        failed.timestamp_ms = now;
        svc.control_cycle(&failed, false, now, &mut motors, &mut sink);
    }
    assert!(svc.is_tripped());
    assert!(sink.events.contains(&AppEvent::VisionDegraded));
}

#[test]
fn watchdog_ignored_in_manual() {
    let (mut svc, mut motors, mut sink) = make_service(ControlMode::Manual);
    svc.handle_command(
        AppCommand::SetManualDuty {
            channel: REAGENT,
            percent: 20.0,
        },
        &mut motors,
        &mut sink,
    )
    .unwrap();
    svc.control_cycle(&fresh(0, 0), false, 60_000, &mut motors, &mut sink);
    assert!(!svc.is_tripped());
    assert_eq!(motors.duty(REAGENT), 20.0);
}
