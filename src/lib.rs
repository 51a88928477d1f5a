//! Froth-vision feedback controller library.
//!
//! Exposes the vision pipeline, the control core and the adapters for
//! integration testing and for embedding in other hosts.  The binary in
//! `main.rs` wires them to a camera and a motor bank.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod orchestrator;
pub mod safety;
pub mod vision;

pub use error::{Error, Result};
