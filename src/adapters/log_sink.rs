//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (stderr via `env_logger` in the binary).  A dashboard
//! push adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ChannelId, EventSink};

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | mode={:?} | bubbles={} avg={:.0}px\u{00b2} | \
                     coverage={:.2}% stability={:.1}% vision={} | setpoint={:.0} I={:.1} | \
                     {}={:.1}% {}={:.1}% {}={:.1}% {}={:.1}% | faults=0b{:08b} | cycle={}",
                    t.mode,
                    t.bubble_count,
                    t.avg_bubble_size,
                    t.froth_coverage * 100.0,
                    t.froth_stability * 100.0,
                    if t.vision_ok { "OK" } else { "STALE" },
                    t.setpoint,
                    t.integral,
                    ChannelId::ReagentPump,
                    t.duties[0],
                    ChannelId::Agitator,
                    t.duties[1],
                    ChannelId::AirPump,
                    t.duties[2],
                    ChannelId::FeedPump,
                    t.duties[3],
                    t.fault_flags,
                    t.cycle_count,
                );
            }
            AppEvent::Started(mode) => {
                info!("START | initial_mode={:?}", mode);
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            AppEvent::Saturated { raw, output } => {
                info!("PI | saturated raw={:.1} clamped={:.1}", raw, output);
            }
            AppEvent::SafetyTripped(flags) => {
                warn!("FAULT | tripped, flags=0b{:08b}", flags);
            }
            AppEvent::SafetyReset => {
                info!("FAULT | latch reset");
            }
            AppEvent::VisionDegraded => {
                warn!("VISION | degraded, metrics stale");
            }
            AppEvent::VisionRestored => {
                info!("VISION | restored");
            }
            AppEvent::CommandRejected(e) => {
                warn!("CMD | rejected: {}", e);
            }
        }
    }
}
