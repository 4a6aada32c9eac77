//! SPI master handler
//!
//! Wraps a native SPI master driver behind a narrow struct-based
//! interface:
//!
//! - [`settings::SpiSettings`] - pins, clock, mode, address width and
//!   duplex/chip-select flags for one device
//! - [`translate`] - settings to native bus/device structures
//! - [`master::SpiMaster`] - bus initialization, device attach, blocking
//!   transmit/receive at a command/address field
//! - [`bus`] - bookkeeping for several devices sharing a host
//! - [`eh`] - `embedded-hal` `SpiDevice` adapter
//! - [`config`] - device settings from TOML

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod bus;
pub mod config;
pub mod eh;
pub mod error;
pub mod master;
pub mod settings;
pub mod translate;

pub use eh::BoundDevice;
pub use error::SpiError;
pub use master::{SpiDevice, SpiMaster, TransferMode};
pub use settings::{SettingsError, SpiSettings};
