//! Native SPI master driver calls
//!
//! Implemented by chip-specific crates. All calls block.

use crate::config::{BusConfig, DeviceInterfaceConfig, DmaChannel};
use crate::error::DriverError;
use crate::spi::SpiHost;
use crate::transaction::Transaction;

/// SPI master driver
///
/// One driver instance manages every host peripheral on the chip. Devices
/// attached to a bus are identified by an opaque [`Self::Handle`].
pub trait SpiMasterDriver {
    /// Handle to an attached device
    type Handle;

    /// Initialize a host bus
    ///
    /// Fails with [`DriverError::InvalidState`] if the bus is already
    /// initialized.
    fn bus_initialize(
        &mut self,
        host: SpiHost,
        config: &BusConfig,
        dma: DmaChannel,
    ) -> Result<(), DriverError>;

    /// Release a host bus
    ///
    /// Every device must have been removed first.
    fn bus_free(&mut self, host: SpiHost) -> Result<(), DriverError>;

    /// Attach a device to an initialized bus
    fn bus_add_device(
        &mut self,
        host: SpiHost,
        config: &DeviceInterfaceConfig,
    ) -> Result<Self::Handle, DriverError>;

    /// Detach a device
    fn bus_remove_device(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;

    /// Run a transaction by busy-waiting on the peripheral
    fn polling_transmit(
        &mut self,
        handle: &Self::Handle,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DriverError>;

    /// Run a transaction through the interrupt-driven queue
    ///
    /// Queues the transaction and blocks until its result is returned.
    fn transmit(
        &mut self,
        handle: &Self::Handle,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DriverError>;

    /// Take exclusive use of the bus for `handle`
    fn acquire_bus(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;

    /// Give up exclusive use of the bus
    fn release_bus(&mut self, handle: &Self::Handle) -> Result<(), DriverError>;
}
