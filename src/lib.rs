//! Hardware-independent control core for the solar powered weather station.
//!
//! This crate owns the duty-cycle state machine, the rolling measurement
//! buffers and their reduction, the supercap hysteresis gates, the persistent
//! timestamp bookkeeping and the bit-exact Sigfox uplink/downlink frames.
//! Peripheral drivers, sensor drivers and the radio protocol engine are
//! consumed through the traits of the [`hal`] module.
//!
//! It is `#![no_std]` so it compiles on the STM32 target as well as on desktop
//! hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod app_state;
pub mod config;
pub mod frames;
pub mod hal;
pub mod power;
pub mod station;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
