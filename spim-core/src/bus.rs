//! Per-host bus bookkeeping
//!
//! Tracks which hosts have an initialized bus, the bus configuration they
//! were initialized with, and the devices attached to each. Several devices
//! may share a host as long as they agree on the bus pins and transfer size.

use heapless::Vec;

use spim_hal::spi::HOST_COUNT;
use spim_hal::{BusConfig, SpiHost};

/// Devices a single host can drive with hardware chip selects
pub const MAX_DEVICES_PER_BUS: usize = 3;

/// A device attached to a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSlot {
    /// Registry-wide device id
    pub id: u32,
    /// Chip select pin, if any
    pub cs: Option<u8>,
}

/// State of one initialized bus
#[derive(Debug, Clone)]
pub struct BusState {
    /// Configuration the bus was initialized with
    pub config: BusConfig,
    /// Attached devices
    pub devices: Vec<DeviceSlot, MAX_DEVICES_PER_BUS>,
}

impl BusState {
    fn new(config: BusConfig) -> Self {
        Self {
            config,
            devices: Vec::new(),
        }
    }

    /// Whether a device already uses chip select `cs`
    pub fn has_cs(&self, cs: u8) -> bool {
        self.devices.iter().any(|d| d.cs == Some(cs))
    }

    /// Whether every device slot is taken
    pub fn is_full(&self) -> bool {
        self.devices.is_full()
    }
}

/// Registry error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Host has no initialized bus
    NotOpen,
    /// No free device slot on the bus
    Full,
}

/// Bus registry for every host
#[derive(Debug, Default)]
pub struct BusRegistry {
    buses: [Option<BusState>; HOST_COUNT],
}

impl BusRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            buses: [None, None, None],
        }
    }

    /// State of the bus on `host`, if initialized
    pub fn bus(&self, host: SpiHost) -> Option<&BusState> {
        self.buses[host.index()].as_ref()
    }

    /// Record a freshly initialized bus
    pub fn open(&mut self, host: SpiHost, config: BusConfig) {
        self.buses[host.index()] = Some(BusState::new(config));
    }

    /// Forget the bus on `host`
    pub fn close(&mut self, host: SpiHost) {
        self.buses[host.index()] = None;
    }

    /// Attach a device to an open bus
    pub fn attach(&mut self, host: SpiHost, slot: DeviceSlot) -> Result<(), RegistryError> {
        let bus = self.buses[host.index()]
            .as_mut()
            .ok_or(RegistryError::NotOpen)?;
        bus.devices.push(slot).map_err(|_| RegistryError::Full)
    }

    /// Detach device `id`, returning how many devices remain on the bus
    pub fn detach(&mut self, host: SpiHost, id: u32) -> Option<usize> {
        let bus = self.buses[host.index()].as_mut()?;
        let pos = bus.devices.iter().position(|d| d.id == id)?;
        bus.devices.swap_remove(pos);
        Some(bus.devices.len())
    }

    /// Whether device `id` is attached to `host`
    pub fn contains(&self, host: SpiHost, id: u32) -> bool {
        self.bus(host)
            .map(|bus| bus.devices.iter().any(|d| d.id == id))
            .unwrap_or(false)
    }

    /// Number of hosts with an initialized bus
    pub fn open_count(&self) -> usize {
        self.buses.iter().flatten().count()
    }
}
