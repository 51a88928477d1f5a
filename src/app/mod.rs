//! Application core: pure domain logic, zero I/O.
//!
//! Business rules for the flotation cell: PI dosing, the safety
//! supervisor and the command/export surface.  All interaction with
//! devices happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without a camera or motor driver.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod shared;
