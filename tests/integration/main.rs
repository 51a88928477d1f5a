//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no camera or
//! PWM hardware required.

mod control_service_tests;
mod mock_hw;
mod orchestrator_tests;
mod pipeline_tests;
