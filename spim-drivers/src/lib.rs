//! SPI device drivers
//!
//! Drivers for peripherals that sit on a bus managed by `spim-core`:
//!
//! - Register-addressed peripherals using the address phase
//!   ([`register::RegisterDevice`])
//! - JEDEC SPI NOR flash over any `embedded-hal` SPI device
//!   ([`flash::SpiFlash`])

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod register;
