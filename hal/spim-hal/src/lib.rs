//! SPIM Hardware Abstraction Layer
//!
//! This crate defines the seam between the SPI master handler and the
//! platform's native SPI master driver. The native driver owns bus
//! arbitration, DMA, interrupt-driven queuing and clock timing; this crate
//! only describes the structures it consumes and the calls it accepts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Device drivers (spim-drivers, etc.)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  spim-core (handler, bus registry)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  spim-hal (this crate - driver seam)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ spim-hal-     │
//!             │    esp32      │
//!             └───────────────┘
//! ```
//!
//! # Contents
//!
//! - [`spi::Mode`], [`spi::Polarity`], [`spi::Phase`] - Clock conventions
//! - [`config::BusConfig`], [`config::DeviceInterfaceConfig`] - Native
//!   configuration structures
//! - [`transaction::Transaction`] - A single native transaction descriptor
//! - [`driver::SpiMasterDriver`] - The native driver calls

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod driver;
pub mod error;
pub mod spi;
pub mod transaction;

// Re-export key types at crate root for convenience
pub use config::{BusConfig, DeviceFlags, DeviceInterfaceConfig, DmaChannel, PIN_UNUSED};
pub use driver::SpiMasterDriver;
pub use error::DriverError;
pub use spi::{InvalidMode, Mode, Phase, Polarity, SpiHost};
pub use transaction::{RxBuffer, Transaction, TransactionFlags, TxBuffer, INLINE_DATA_LEN};
