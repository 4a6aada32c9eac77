//! User-facing SPI device settings
//!
//! [`SpiSettings`] is the narrow struct a caller fills in to describe one
//! device on one bus. It is translated into the native structures by
//! [`crate::translate`].

use core::fmt;

use spim_hal::{Mode, SpiHost};

/// Highest GPIO number accepted for a pin
pub const MAX_GPIO: u8 = 48;

/// Widest command/address phase, bounded by the command phase limit
pub const MAX_CMD_ADDR_BITS: u8 = 16;

/// Largest transfer a DMA-backed bus can be configured for
pub const MAX_DMA_TRANSFER: u32 = 32_768;

/// Settings for one SPI device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiSettings {
    /// Host peripheral, e.g. SPI2
    pub host: SpiHost,
    /// MISO pin; `None` for 3-wire operation on MOSI
    pub miso: Option<u8>,
    /// MOSI pin
    pub mosi: u8,
    /// Clock pin
    pub sclk: u8,
    /// Hardware chip select pin; `None` if the device has none
    pub cs: Option<u8>,
    /// Clock speed in Hz
    pub hz: u32,
    /// Max transfer size in bytes, 0 for the driver default
    pub max_bytes: u32,
    /// CPOL/CPHA mode
    pub mode: Mode,
    /// Delay from SCLK edge to valid data, in ns
    pub delay_ns: u32,
    /// Width of both the command and the address phase
    pub cmd_addr_bits: u8,
    /// Use interrupt-driven transfers instead of polling
    pub intr_transfer: bool,
    /// Half-duplex mode
    pub half_duplex: bool,
    /// Chip select is active high
    pub positive_cs: bool,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            host: SpiHost::Spi2,
            miso: None,
            mosi: 0,
            sclk: 0,
            cs: None,
            hz: 1_000_000, // 1 MHz
            max_bytes: 0,
            mode: Mode::Mode0,
            delay_ns: 0,
            cmd_addr_bits: 0,
            intr_transfer: false,
            half_duplex: false,
            positive_cs: false,
        }
    }
}

impl SpiSettings {
    /// Settings for a 4-wire device on `host`
    pub fn new(host: SpiHost, miso: u8, mosi: u8, sclk: u8, cs: u8) -> Self {
        Self {
            host,
            miso: Some(miso),
            mosi,
            sclk,
            cs: Some(cs),
            ..Self::default()
        }
    }

    /// Set the clock speed
    pub fn with_hz(mut self, hz: u32) -> Self {
        self.hz = hz;
        self
    }

    /// Set the SPI mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the command/address phase width
    pub fn with_cmd_addr_bits(mut self, bits: u8) -> Self {
        self.cmd_addr_bits = bits;
        self
    }

    /// Enable half-duplex operation
    pub fn half_duplex(mut self) -> Self {
        self.half_duplex = true;
        self
    }

    /// Use interrupt-driven transfers
    pub fn interrupt_transfers(mut self) -> Self {
        self.intr_transfer = true;
        self
    }

    /// Check the settings before touching the hardware
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.host.is_reserved() {
            return Err(SettingsError::ReservedHost);
        }
        if self.hz == 0 {
            return Err(SettingsError::ZeroClock);
        }
        if self.cmd_addr_bits > MAX_CMD_ADDR_BITS {
            return Err(SettingsError::CmdAddrTooWide);
        }
        if self.max_bytes > MAX_DMA_TRANSFER {
            return Err(SettingsError::TransferTooLarge);
        }
        if self.miso.is_none() && !self.half_duplex {
            return Err(SettingsError::ThreeWireNeedsHalfDuplex);
        }

        let pins = [self.miso, Some(self.mosi), Some(self.sclk), self.cs];
        for (i, pin) in pins.iter().enumerate() {
            let Some(pin) = pin else { continue };
            if *pin > MAX_GPIO {
                return Err(SettingsError::InvalidPin(*pin));
            }
            if pins[i + 1..].iter().flatten().any(|other| other == pin) {
                return Err(SettingsError::PinConflict(*pin));
            }
        }

        Ok(())
    }
}

/// Settings rejected before reaching the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// SPI1 belongs to the flash controller
    ReservedHost,
    /// Clock speed of 0 Hz
    ZeroClock,
    /// Command/address width above [`MAX_CMD_ADDR_BITS`]
    CmdAddrTooWide,
    /// Max transfer above [`MAX_DMA_TRANSFER`]
    TransferTooLarge,
    /// Pin number above [`MAX_GPIO`]
    InvalidPin(u8),
    /// The same pin is used for two signals
    PinConflict(u8),
    /// No MISO pin but full-duplex requested
    ThreeWireNeedsHalfDuplex,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::ReservedHost => f.write_str("SPI1 is reserved for flash"),
            SettingsError::ZeroClock => f.write_str("clock speed must be non-zero"),
            SettingsError::CmdAddrTooWide => {
                write!(f, "command/address width exceeds {} bits", MAX_CMD_ADDR_BITS)
            }
            SettingsError::TransferTooLarge => {
                write!(f, "max transfer exceeds {} bytes", MAX_DMA_TRANSFER)
            }
            SettingsError::InvalidPin(pin) => write!(f, "invalid pin gpio{}", pin),
            SettingsError::PinConflict(pin) => write!(f, "pin gpio{} assigned twice", pin),
            SettingsError::ThreeWireNeedsHalfDuplex => {
                f.write_str("3-wire operation requires half-duplex")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SpiSettings {
        SpiSettings::new(SpiHost::Spi2, 19, 23, 18, 5)
    }

    #[test]
    fn test_valid_settings() {
        assert_eq!(valid().validate(), Ok(()));
        assert_eq!(valid().with_cmd_addr_bits(16).validate(), Ok(()));
    }

    #[test]
    fn test_default_settings() {
        let s = SpiSettings::default();
        assert_eq!(s.host, SpiHost::Spi2);
        assert_eq!(s.hz, 1_000_000);
        assert_eq!(s.mode, Mode::Mode0);
        assert_eq!(s.max_bytes, 0);
        assert_eq!(s.cs, None);
        assert!(!s.half_duplex);
        assert!(!s.positive_cs);
    }

    #[test]
    fn test_reserved_host() {
        let mut s = valid();
        s.host = SpiHost::Spi1;
        assert_eq!(s.validate(), Err(SettingsError::ReservedHost));
    }

    #[test]
    fn test_zero_clock() {
        assert_eq!(valid().with_hz(0).validate(), Err(SettingsError::ZeroClock));
    }

    #[test]
    fn test_cmd_addr_width() {
        assert_eq!(
            valid().with_cmd_addr_bits(17).validate(),
            Err(SettingsError::CmdAddrTooWide)
        );
    }

    #[test]
    fn test_max_transfer_limit() {
        let mut s = valid();
        s.max_bytes = MAX_DMA_TRANSFER;
        assert_eq!(s.validate(), Ok(()));
        s.max_bytes = MAX_DMA_TRANSFER + 1;
        assert_eq!(s.validate(), Err(SettingsError::TransferTooLarge));
    }

    #[test]
    fn test_pin_checks() {
        let s = SpiSettings::new(SpiHost::Spi2, 19, 23, 18, 23);
        assert_eq!(s.validate(), Err(SettingsError::PinConflict(23)));

        let s = SpiSettings::new(SpiHost::Spi2, 60, 23, 18, 5);
        assert_eq!(s.validate(), Err(SettingsError::InvalidPin(60)));

        // No CS is fine
        let mut s = valid();
        s.cs = None;
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_three_wire_requires_half_duplex() {
        let mut s = valid();
        s.miso = None;
        assert_eq!(s.validate(), Err(SettingsError::ThreeWireNeedsHalfDuplex));
        assert_eq!(s.half_duplex().validate(), Ok(()));
    }
}
