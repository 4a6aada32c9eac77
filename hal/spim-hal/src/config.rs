//! Native bus and device configuration structures
//!
//! These mirror the structures the native SPI master driver consumes when a
//! bus is initialized and a device is attached to it. Field names follow the
//! native driver so a backend can copy them across one to one.

use core::ops::{BitOr, BitOrAssign};

use crate::spi::Mode;

/// Pin number meaning "not connected"
pub const PIN_UNUSED: i32 = -1;

/// Duty cycle position for a 50% clock
pub const DUTY_CYCLE_50: u16 = 128;

/// Bus-level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Master out, slave in (data0)
    pub mosi_io_num: i32,
    /// Master in, slave out (data1), or [`PIN_UNUSED`] for 3-wire
    pub miso_io_num: i32,
    /// Clock pin
    pub sclk_io_num: i32,
    /// Write protect (data2), quad mode only
    pub quadwp_io_num: i32,
    /// Hold (data3), quad mode only
    pub quadhd_io_num: i32,
    /// Largest single transfer in bytes, 0 for the driver default
    pub max_transfer_sz: i32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mosi_io_num: PIN_UNUSED,
            miso_io_num: PIN_UNUSED,
            sclk_io_num: PIN_UNUSED,
            quadwp_io_num: PIN_UNUSED,
            quadhd_io_num: PIN_UNUSED,
            max_transfer_sz: 0,
        }
    }
}

/// DMA channel selection for a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaChannel {
    /// CPU-driven transfers only, limited to the hardware FIFO
    Disabled,
    /// Let the driver pick a free DMA channel
    #[default]
    Auto,
}

/// Device behaviour flags
///
/// Bit values match the native driver's `SPI_DEVICE_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceFlags(u32);

impl DeviceFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Transmit and receive LSB first
    pub const BIT_LSBFIRST: Self = Self(0b11);
    /// MOSI doubles as MISO
    pub const THREE_WIRE: Self = Self(1 << 2);
    /// Chip select is active high
    pub const POSITIVE_CS: Self = Self(1 << 3);
    /// Send and receive phases are sequential, never simultaneous
    pub const HALFDUPLEX: Self = Self(1 << 4);
    /// Skip the dummy phase inserted for high input delays
    pub const NO_DUMMY: Self = Self(1 << 6);

    /// Raw bit value for the native driver
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other` if `enabled`
    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for DeviceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Per-device interface configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInterfaceConfig {
    /// Width of the command phase (0-16)
    pub command_bits: u8,
    /// Width of the address phase (0-64)
    pub address_bits: u8,
    /// Dummy bits between address and data phases
    pub dummy_bits: u8,
    /// Clock polarity/phase
    pub mode: Mode,
    /// Clock duty cycle in 1/256 (128 = 50%)
    pub duty_cycle_pos: u16,
    /// CS setup time in clock cycles (half-duplex only)
    pub cs_ena_pretrans: u16,
    /// CS hold time in clock cycles
    pub cs_ena_posttrans: u8,
    /// Clock speed in Hz
    pub clock_speed_hz: i32,
    /// Slave output delay from SCLK to valid data, in ns
    pub input_delay_ns: i32,
    /// Chip select pin, or [`PIN_UNUSED`]
    pub spics_io_num: i32,
    /// Behaviour flags
    pub flags: DeviceFlags,
    /// Number of transactions the driver may hold in flight
    pub queue_size: i32,
}

impl Default for DeviceInterfaceConfig {
    fn default() -> Self {
        Self {
            command_bits: 0,
            address_bits: 0,
            dummy_bits: 0,
            mode: Mode::Mode0,
            duty_cycle_pos: DUTY_CYCLE_50,
            cs_ena_pretrans: 0,
            cs_ena_posttrans: 0,
            clock_speed_hz: 0,
            input_delay_ns: 0,
            spics_io_num: PIN_UNUSED,
            flags: DeviceFlags::NONE,
            queue_size: 1,
        }
    }
}
