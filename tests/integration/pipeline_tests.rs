//! Vision pipeline end to end: scripted camera → segmenter → aggregator.

use futures_lite::future::block_on;
use image::{GrayImage, Luma};

use crate::mock_hw::{ManualClock, ScriptedCamera};

use frothctl::adapters::camera::SyntheticFrothCamera;
use frothctl::app::ports::CaptureError;
use frothctl::config::SystemConfig;
use frothctl::orchestrator::VisionPipeline;

fn bench_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.camera.frame_width = 320;
    config.camera.frame_height = 240;
    config.camera.capture_attempts = 2;
    config.camera.retry_delay_ms = 0;
    config
}

fn froth(occupancy: f32, seed: u64) -> GrayImage {
    let mut cam = SyntheticFrothCamera::new(320, 240, seed);
    cam.set_occupancy(occupancy);
    cam.render()
}

#[test]
fn good_frame_produces_metrics() {
    let config = bench_config();
    let camera = ScriptedCamera::new([Ok(froth(1.0, 7))]);
    let mut pipeline = VisionPipeline::new(camera, &config);
    let clock = ManualClock::at(1_000);

    let m = block_on(pipeline.run_cycle(&clock));
    assert!(m.success);
    assert!(m.bubble_count > 0);
    assert!(m.avg_bubble_size > 0.0);
    assert!(m.froth_coverage > 0.0 && m.froth_coverage < 1.0);
    assert_eq!(m.froth_stability, 1.0, "one sample has no spread");
    assert_eq!(m.timestamp_ms, 1_000);
}

#[test]
fn camera_failure_keeps_last_values() {
    let config = bench_config();
    let camera = ScriptedCamera::new([Ok(froth(1.0, 3))]);
    let mut pipeline = VisionPipeline::new(camera, &config);
    let clock = ManualClock::at(500);

    let good = block_on(pipeline.run_cycle(&clock));
    clock.advance(500);
    let failed = block_on(pipeline.run_cycle(&clock));

    assert!(!failed.success);
    assert_eq!(failed.bubble_count, good.bubble_count);
    assert_eq!(failed.avg_bubble_size, good.avg_bubble_size);
    assert_eq!(failed.froth_coverage, good.froth_coverage);
    assert_eq!(failed.timestamp_ms, 1_000);
}

#[test]
fn transient_failure_recovered_by_retry() {
    let config = bench_config();
    let camera = ScriptedCamera::new([Err(CaptureError::NoFrame), Ok(froth(1.0, 5))]);
    let mut pipeline = VisionPipeline::new(camera, &config);
    let m = block_on(pipeline.run_cycle(&ManualClock::at(10)));
    assert!(m.success);
    assert!(m.bubble_count > 0);
}

#[test]
fn denser_froth_counts_more_bubbles() {
    let config = bench_config();
    let camera = ScriptedCamera::new([Ok(froth(0.2, 11)), Ok(froth(1.0, 11))]);
    let mut pipeline = VisionPipeline::new(camera, &config);
    let clock = ManualClock::at(0);

    let sparse = block_on(pipeline.run_cycle(&clock));
    clock.advance(500);
    let dense = block_on(pipeline.run_cycle(&clock));
    assert!(sparse.success && dense.success);
    assert!(
        dense.bubble_count > sparse.bubble_count,
        "dense {} vs sparse {}",
        dense.bubble_count,
        sparse.bubble_count
    );
    assert!(dense.froth_coverage > sparse.froth_coverage);
}

#[test]
fn uniform_frame_is_a_successful_empty_result() {
    let config = bench_config();
    let blank = GrayImage::from_pixel(320, 240, Luma([128]));
    let camera = ScriptedCamera::new([Ok(blank)]);
    let mut pipeline = VisionPipeline::new(camera, &config);
    let m = block_on(pipeline.run_cycle(&ManualClock::at(0)));
    assert!(m.success);
    assert_eq!(m.bubble_count, 0);
    assert_eq!(m.avg_bubble_size, 0.0);
    assert_eq!(m.froth_coverage, 0.0);
}
