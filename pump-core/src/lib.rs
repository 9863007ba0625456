#![no_std]

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;

// Control and protection core of the fuel-pump power-stage controller.
//
// The crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library; hardware is reached only through the small traits in
// `sensors`, `actuator`, `pwm_input` and `control`.
pub mod actuator;
pub mod bus;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod filter;
pub mod indicator;
pub mod protection;
pub mod pwm_input;
pub mod sensors;
pub mod telemetry;
pub mod time;
