//! Native driver error codes

use core::fmt;

/// Error reported by the native SPI master driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// An argument was rejected (bad pin, bad size, unsupported combination)
    InvalidArg,
    /// The call is not valid in the current state (bus already
    /// initialized, device still attached, ...)
    InvalidState,
    /// No free slot (no CS slot left on the bus, no DMA channel)
    NotFound,
    /// Out of memory
    NoMem,
    /// Feature not supported by this driver or chip
    NotSupported,
    /// Timed out waiting for the bus or a transaction result
    Timeout,
    /// Any other native error code
    Other(i32),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::InvalidArg => f.write_str("invalid argument"),
            DriverError::InvalidState => f.write_str("invalid state"),
            DriverError::NotFound => f.write_str("no free slot"),
            DriverError::NoMem => f.write_str("out of memory"),
            DriverError::NotSupported => f.write_str("not supported"),
            DriverError::Timeout => f.write_str("timeout"),
            DriverError::Other(code) => write!(f, "driver error {}", code),
        }
    }
}
