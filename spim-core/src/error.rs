//! Handler errors

use core::fmt;

use spim_hal::DriverError;

use crate::bus::RegistryError;
use crate::settings::SettingsError;

/// SPI handler error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    /// Settings rejected before reaching the driver
    Settings(SettingsError),
    /// Native driver reported an error
    Driver(DriverError),
    /// Host bus already initialized with different pins or transfer size
    BusConflict,
    /// A device with the same chip select is already on the bus
    DeviceExists,
    /// No device slot left on the bus
    BusFull,
    /// Buffer longer than the device's max transfer
    TransferTooLarge,
    /// Full-duplex transfer requested on a half-duplex device
    HalfDuplexTransfer,
    /// Device is not attached to this master (already released)
    UnknownDevice,
    /// Device has a command/address phase, which `embedded-hal` operations
    /// cannot carry
    AddressPhase,
}

impl From<SettingsError> for SpiError {
    fn from(e: SettingsError) -> Self {
        SpiError::Settings(e)
    }
}

impl From<DriverError> for SpiError {
    fn from(e: DriverError) -> Self {
        SpiError::Driver(e)
    }
}

impl From<RegistryError> for SpiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotOpen => SpiError::Driver(DriverError::InvalidState),
            RegistryError::Full => SpiError::BusFull,
        }
    }
}

impl fmt::Display for SpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpiError::Settings(e) => write!(f, "settings: {}", e),
            SpiError::Driver(e) => write!(f, "driver: {}", e),
            SpiError::BusConflict => f.write_str("bus already initialized with other pins"),
            SpiError::DeviceExists => f.write_str("chip select already in use on this bus"),
            SpiError::BusFull => f.write_str("no device slot left on this bus"),
            SpiError::TransferTooLarge => f.write_str("transfer exceeds max transfer size"),
            SpiError::HalfDuplexTransfer => {
                f.write_str("full-duplex transfer on a half-duplex device")
            }
            SpiError::UnknownDevice => f.write_str("device not attached"),
            SpiError::AddressPhase => f.write_str("device has a command/address phase"),
        }
    }
}

impl embedded_hal::spi::Error for SpiError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}
