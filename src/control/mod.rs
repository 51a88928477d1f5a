//! Closed-loop reagent dosing.

pub mod pi;
