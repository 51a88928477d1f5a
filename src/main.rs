//! frothctl main entry point
//!
//! Hexagonal architecture with two cooperative cadences.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ImageSequenceCamera  SimMotorOutput  LatchedStopSignal        │
//! │  SyntheticFrothCamera LogEventSink    FileConfig  Clock    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  VisionPipeline ──FrothMetrics──▶ ControlService        │    │
//! │  │  Segmenter · Aggregator           PI · Safety           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Orchestrator (edge-executor: vision · control · commands)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::cell::RefCell;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use frothctl::adapters::camera::{ImageSequenceCamera, SyntheticFrothCamera};
use frothctl::adapters::config_file::FileConfig;
use frothctl::adapters::log_sink::LogEventSink;
use frothctl::adapters::motor::SimMotorOutput;
use frothctl::adapters::stop_signal::LatchedStopSignal;
use frothctl::adapters::time::MonotonicClock;
use frothctl::app::ports::{CameraPort, Clock, ConfigPort};
use frothctl::app::shared::SharedState;
use frothctl::config::SystemConfig;
use frothctl::orchestrator::{self, ControlRig, VisionPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file (defaults apply when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of froth images to replay instead of the synthetic camera
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Seed for the synthetic froth generator
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Stop after this many control cycles (runs forever when omitted)
    #[arg(long)]
    cycles: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Write the effective configuration to a file (`.bin` = postcard) and exit
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("frothctl v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = match &args.config {
        Some(path) => FileConfig::new(path)
            .load()
            .map_err(frothctl::Error::from)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SystemConfig::default(),
    };
    config
        .validate()
        .map_err(frothctl::Error::from)
        .context("validating config")?;

    if args.print_config {
        println!(
            "{}",
            serde_json::to_string(&config).context("serialising config")?
        );
        return Ok(());
    }
    if let Some(path) = &args.save_config {
        FileConfig::new(path)
            .save(&config)
            .map_err(frothctl::Error::from)
            .with_context(|| format!("saving config to {}", path.display()))?;
        return Ok(());
    }

    // ── 3. Camera ─────────────────────────────────────────────
    match &args.frames {
        Some(dir) => {
            let camera = ImageSequenceCamera::open(dir)
                .map_err(frothctl::Error::from)
                .with_context(|| format!("opening frame directory {}", dir.display()))?;
            run(&config, camera, args.cycles);
        }
        None => {
            let camera = SyntheticFrothCamera::new(
                config.camera.frame_width,
                config.camera.frame_height,
                args.seed,
            );
            run(&config, camera, args.cycles);
        }
    }

    info!("frothctl stopped");
    Ok(())
}

/// Wire the adapters and hand over to the orchestrator.
fn run(config: &SystemConfig, camera: impl CameraPort, cycles: Option<u64>) {
    let clock = MonotonicClock::new();
    let stop = LatchedStopSignal::new();

    let rig = ControlRig::new(
        config,
        SimMotorOutput::new(),
        stop,
        LogEventSink::new(),
        clock.now_ms(),
    );
    let shared = SharedState::new(rig.service.controller_state(), rig.service.safety_state());
    let rig = RefCell::new(rig);
    let pipeline = VisionPipeline::new(camera, config);

    orchestrator::run(config, pipeline, &rig, &shared, &clock, cycles);

    let snapshot = shared.snapshot();
    match snapshot.to_json() {
        Ok(json) => info!("Final status: {}", json),
        Err(e) => log::warn!("Final status unavailable: {}", e),
    }
}
