//! Emergency stop inputs.
//!
//! The plant's mushroom button pulls the line low through a normally-closed
//! contact, so a broken wire reads as asserted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::StopSignalPort;

/// Active-low GPIO stop input (pull-up enabled by the HAL).
pub struct GpioStopSignal<P: InputPin> {
    pin: P,
}

impl<P: InputPin> GpioStopSignal<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> StopSignalPort for GpioStopSignal<P> {
    fn is_asserted(&mut self) -> bool {
        // A read error counts as asserted.
        self.pin.is_low().unwrap_or_else(|_| {
            warn!("Stop input read failed; treating as asserted");
            true
        })
    }
}

/// Software stop level shared with a button handler or test harness.
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct LatchedStopSignal {
    level: Arc<AtomicBool>,
}

impl LatchedStopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert(&self) {
        self.level.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.level.store(false, Ordering::SeqCst);
    }
}

impl StopSignalPort for LatchedStopSignal {
    fn is_asserted(&mut self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}
