//! SPI bus conventions
//!
//! Host peripheral selection and the clock polarity/phase modes shared by
//! the handler and the native driver.

use core::fmt;

/// Number of SPI host peripherals
pub const HOST_COUNT: usize = 3;

/// SPI host peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiHost {
    /// SPI1, shared with the flash/PSRAM controller
    Spi1,
    /// SPI2 (HSPI on ESP32), general purpose
    #[default]
    Spi2,
    /// SPI3 (VSPI on ESP32), general purpose
    Spi3,
}

impl SpiHost {
    /// Zero-based slot for per-host bookkeeping
    pub const fn index(self) -> usize {
        match self {
            SpiHost::Spi1 => 0,
            SpiHost::Spi2 => 1,
            SpiHost::Spi3 => 2,
        }
    }

    /// Whether this host is reserved for the flash/PSRAM controller
    pub const fn is_reserved(self) -> bool {
        matches!(self, SpiHost::Spi1)
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Build a mode from its polarity and phase
    pub const fn from_parts(polarity: Polarity, phase: Phase) -> Self {
        match (polarity, phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => 0,
            Mode::Mode1 => 1,
            Mode::Mode2 => 2,
            Mode::Mode3 => 3,
        }
    }
}

/// Mode number outside 0-3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidMode(pub u8);

impl fmt::Display for InvalidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid SPI mode {}", self.0)
    }
}

impl TryFrom<u8> for Mode {
    type Error = InvalidMode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Mode0),
            1 => Ok(Mode::Mode1),
            2 => Ok(Mode::Mode2),
            3 => Ok(Mode::Mode3),
            n => Err(InvalidMode(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parts() {
        let (pol, pha): (Polarity, Phase) = Mode::Mode2.into();
        assert_eq!(pol, Polarity::IdleHigh);
        assert_eq!(pha, Phase::CaptureOnFirstTransition);

        for mode in [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3] {
            let (pol, pha) = mode.into();
            assert_eq!(Mode::from_parts(pol, pha), mode);
        }
    }

    #[test]
    fn test_mode_numbers() {
        assert_eq!(u8::from(Mode::Mode0), 0);
        assert_eq!(u8::from(Mode::Mode3), 3);
        assert_eq!(Mode::try_from(1), Ok(Mode::Mode1));
        assert_eq!(Mode::try_from(4), Err(InvalidMode(4)));
        assert_eq!(Mode::try_from(255), Err(InvalidMode(255)));
    }

    #[test]
    fn test_host_slots() {
        assert_eq!(SpiHost::Spi1.index(), 0);
        assert_eq!(SpiHost::Spi3.index(), HOST_COUNT - 1);
        assert!(SpiHost::Spi1.is_reserved());
        assert!(!SpiHost::Spi2.is_reserved());
        assert_eq!(SpiHost::default(), SpiHost::Spi2);
    }
}
