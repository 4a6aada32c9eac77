//! Settings to native structure translation
//!
//! Pure functions: the same settings always produce the same native
//! configuration, which is what lets the bus registry compare bus configs
//! of devices sharing a host.

use spim_hal::{BusConfig, DeviceFlags, DeviceInterfaceConfig, DmaChannel, PIN_UNUSED};

use crate::settings::SpiSettings;

/// Transactions the native driver may hold in flight per device
pub const QUEUE_SIZE: i32 = 7;

/// Max transfer the native driver uses when none is configured (DMA enabled)
pub const DEFAULT_MAX_TRANSFER: usize = 4092;

/// DMA channel used for every bus
pub const DMA_CHANNEL: DmaChannel = DmaChannel::Auto;

fn pin(pin: Option<u8>) -> i32 {
    pin.map_or(PIN_UNUSED, i32::from)
}

/// Build the bus configuration
pub fn bus_config(settings: &SpiSettings) -> BusConfig {
    BusConfig {
        mosi_io_num: i32::from(settings.mosi),
        miso_io_num: pin(settings.miso),
        sclk_io_num: i32::from(settings.sclk),
        // Quad lines are never used
        quadwp_io_num: PIN_UNUSED,
        quadhd_io_num: PIN_UNUSED,
        max_transfer_sz: settings.max_bytes as i32,
    }
}

/// Build the device interface configuration
pub fn device_config(settings: &SpiSettings) -> DeviceInterfaceConfig {
    let mut flags = DeviceFlags::NONE;
    flags.set(DeviceFlags::HALFDUPLEX, settings.half_duplex);
    flags.set(DeviceFlags::POSITIVE_CS, settings.positive_cs);
    flags.set(DeviceFlags::THREE_WIRE, settings.miso.is_none());

    DeviceInterfaceConfig {
        command_bits: settings.cmd_addr_bits,
        address_bits: settings.cmd_addr_bits,
        dummy_bits: 0,
        mode: settings.mode,
        clock_speed_hz: settings.hz.min(i32::MAX as u32) as i32,
        input_delay_ns: settings.delay_ns.min(i32::MAX as u32) as i32,
        spics_io_num: pin(settings.cs),
        flags,
        queue_size: QUEUE_SIZE,
        ..DeviceInterfaceConfig::default()
    }
}

/// Largest transfer a device may issue
pub fn effective_max_transfer(settings: &SpiSettings) -> usize {
    match settings.max_bytes {
        0 => DEFAULT_MAX_TRANSFER,
        n => n as usize,
    }
}
