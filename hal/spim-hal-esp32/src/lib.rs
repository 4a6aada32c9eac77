//! ESP-IDF backend for the SPIM handler
//!
//! Implements [`spim_hal::SpiMasterDriver`] on top of the ESP-IDF
//! `spi_master` component through `esp-idf-sys`:
//!
//! - `spi_bus_initialize` / `spi_bus_free`
//! - `spi_bus_add_device` / `spi_bus_remove_device`
//! - `spi_device_polling_transmit` and `spi_device_transmit`
//! - `spi_device_acquire_bus` / `spi_device_release_bus`
//!
//! Every call blocks the calling task until the native driver returns.

#![no_std]

use core::ptr;

use esp_idf_sys::{
    esp, spi_bus_add_device, spi_bus_config_t, spi_bus_config_t__bindgen_ty_1,
    spi_bus_config_t__bindgen_ty_2, spi_bus_config_t__bindgen_ty_3,
    spi_bus_config_t__bindgen_ty_4, spi_bus_free, spi_bus_initialize, spi_bus_remove_device,
    spi_common_dma_t_SPI_DMA_CH_AUTO, spi_common_dma_t_SPI_DMA_DISABLED,
    spi_device_acquire_bus, spi_device_handle_t, spi_device_interface_config_t,
    spi_device_polling_transmit, spi_device_release_bus, spi_device_transmit,
    spi_dma_chan_t, spi_host_device_t, spi_host_device_t_SPI1_HOST,
    spi_host_device_t_SPI2_HOST, spi_host_device_t_SPI3_HOST, spi_transaction_t,
    spi_transaction_t__bindgen_ty_1, spi_transaction_t__bindgen_ty_2, EspError, TickType_t,
    ESP_ERR_INVALID_ARG, ESP_ERR_INVALID_STATE, ESP_ERR_NOT_FOUND, ESP_ERR_NOT_SUPPORTED,
    ESP_ERR_NO_MEM, ESP_ERR_TIMEOUT, SPICOMMON_BUSFLAG_MASTER,
};

use spim_hal::{
    BusConfig, DeviceInterfaceConfig, DmaChannel, DriverError, RxBuffer, SpiHost,
    SpiMasterDriver, Transaction, TxBuffer, INLINE_DATA_LEN,
};

/// Wait forever when acquiring the bus
const BLOCK: TickType_t = TickType_t::MAX;

fn native_host(host: SpiHost) -> spi_host_device_t {
    match host {
        SpiHost::Spi1 => spi_host_device_t_SPI1_HOST,
        SpiHost::Spi2 => spi_host_device_t_SPI2_HOST,
        SpiHost::Spi3 => spi_host_device_t_SPI3_HOST,
    }
}

fn native_dma(dma: DmaChannel) -> spi_dma_chan_t {
    match dma {
        DmaChannel::Disabled => spi_common_dma_t_SPI_DMA_DISABLED,
        DmaChannel::Auto => spi_common_dma_t_SPI_DMA_CH_AUTO,
    }
}

/// Map a native error code onto [`DriverError`]
pub fn driver_error(err: EspError) -> DriverError {
    let code = err.code();
    match code {
        c if c == ESP_ERR_INVALID_ARG as i32 => DriverError::InvalidArg,
        c if c == ESP_ERR_INVALID_STATE as i32 => DriverError::InvalidState,
        c if c == ESP_ERR_NOT_FOUND as i32 => DriverError::NotFound,
        c if c == ESP_ERR_NO_MEM as i32 => DriverError::NoMem,
        c if c == ESP_ERR_NOT_SUPPORTED as i32 => DriverError::NotSupported,
        c if c == ESP_ERR_TIMEOUT as i32 => DriverError::Timeout,
        c => DriverError::Other(c),
    }
}

fn bus_config(config: &BusConfig) -> spi_bus_config_t {
    spi_bus_config_t {
        flags: SPICOMMON_BUSFLAG_MASTER,
        sclk_io_num: config.sclk_io_num,
        __bindgen_anon_1: spi_bus_config_t__bindgen_ty_1 {
            mosi_io_num: config.mosi_io_num,
        },
        __bindgen_anon_2: spi_bus_config_t__bindgen_ty_2 {
            miso_io_num: config.miso_io_num,
        },
        __bindgen_anon_3: spi_bus_config_t__bindgen_ty_3 {
            quadwp_io_num: config.quadwp_io_num,
        },
        __bindgen_anon_4: spi_bus_config_t__bindgen_ty_4 {
            quadhd_io_num: config.quadhd_io_num,
        },
        data4_io_num: -1,
        data5_io_num: -1,
        data6_io_num: -1,
        data7_io_num: -1,
        max_transfer_sz: config.max_transfer_sz,
        ..Default::default()
    }
}

fn device_config(config: &DeviceInterfaceConfig) -> spi_device_interface_config_t {
    spi_device_interface_config_t {
        command_bits: config.command_bits,
        address_bits: config.address_bits,
        dummy_bits: config.dummy_bits,
        mode: u8::from(config.mode),
        duty_cycle_pos: config.duty_cycle_pos,
        cs_ena_pretrans: config.cs_ena_pretrans,
        cs_ena_posttrans: config.cs_ena_posttrans,
        clock_speed_hz: config.clock_speed_hz,
        input_delay_ns: config.input_delay_ns,
        spics_io_num: config.spics_io_num,
        flags: config.flags.bits(),
        queue_size: config.queue_size,
        ..Default::default()
    }
}

/// Build the native descriptor
///
/// Slice buffers are borrowed by pointer; the descriptor must not outlive
/// `t`.
fn native_transaction(t: &mut Transaction<'_>) -> spi_transaction_t {
    let mut native = spi_transaction_t {
        flags: t.flags.bits(),
        cmd: t.cmd,
        addr: t.addr,
        length: t.length,
        rxlength: t.rx_length,
        ..Default::default()
    };

    native.__bindgen_anon_1 = match &t.tx {
        TxBuffer::None => spi_transaction_t__bindgen_ty_1 {
            tx_buffer: ptr::null(),
        },
        TxBuffer::Inline(data) => spi_transaction_t__bindgen_ty_1 { tx_data: *data },
        TxBuffer::Slice(data) => spi_transaction_t__bindgen_ty_1 {
            tx_buffer: data.as_ptr() as *const _,
        },
    };

    native.__bindgen_anon_2 = match &mut t.rx {
        RxBuffer::None => spi_transaction_t__bindgen_ty_2 {
            rx_buffer: ptr::null_mut(),
        },
        RxBuffer::Inline(_) => spi_transaction_t__bindgen_ty_2 {
            rx_data: [0; INLINE_DATA_LEN],
        },
        RxBuffer::Slice(data) => spi_transaction_t__bindgen_ty_2 {
            rx_buffer: data.as_mut_ptr() as *mut _,
        },
        RxBuffer::InPlace(data) => {
            // The native driver accepts the same buffer on both sides
            let buf = data.as_mut_ptr();
            native.__bindgen_anon_1 = spi_transaction_t__bindgen_ty_1 {
                tx_buffer: buf as *const _,
            };
            spi_transaction_t__bindgen_ty_2 {
                rx_buffer: buf as *mut _,
            }
        }
    };

    native
}

/// Copy inline receive data back after completion
fn finish(t: &mut Transaction<'_>, native: &spi_transaction_t) {
    if let RxBuffer::Inline(data) = &mut t.rx {
        // SAFETY: the inline variant was selected in `native_transaction`
        *data = unsafe { native.__bindgen_anon_2.rx_data };
    }
}

/// ESP-IDF SPI master driver
///
/// Zero-sized: the native driver keeps all bus and device state.
#[derive(Debug, Default)]
pub struct EspSpiDriver;

impl EspSpiDriver {
    /// Create the driver
    pub const fn new() -> Self {
        Self
    }
}

impl SpiMasterDriver for EspSpiDriver {
    type Handle = spi_device_handle_t;

    fn bus_initialize(
        &mut self,
        host: SpiHost,
        config: &BusConfig,
        dma: DmaChannel,
    ) -> Result<(), DriverError> {
        let native = bus_config(config);
        esp!(unsafe { spi_bus_initialize(native_host(host), &native, native_dma(dma)) })
            .map_err(driver_error)
    }

    fn bus_free(&mut self, host: SpiHost) -> Result<(), DriverError> {
        esp!(unsafe { spi_bus_free(native_host(host)) }).map_err(driver_error)
    }

    fn bus_add_device(
        &mut self,
        host: SpiHost,
        config: &DeviceInterfaceConfig,
    ) -> Result<spi_device_handle_t, DriverError> {
        let native = device_config(config);
        let mut handle: spi_device_handle_t = ptr::null_mut();
        esp!(unsafe { spi_bus_add_device(native_host(host), &native, &mut handle as *mut _) })
            .map_err(driver_error)?;
        Ok(handle)
    }

    fn bus_remove_device(&mut self, handle: &spi_device_handle_t) -> Result<(), DriverError> {
        esp!(unsafe { spi_bus_remove_device(*handle) }).map_err(driver_error)
    }

    fn polling_transmit(
        &mut self,
        handle: &spi_device_handle_t,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DriverError> {
        let mut native = native_transaction(transaction);
        esp!(unsafe { spi_device_polling_transmit(*handle, &mut native as *mut _) })
            .map_err(driver_error)?;
        finish(transaction, &native);
        Ok(())
    }

    fn transmit(
        &mut self,
        handle: &spi_device_handle_t,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), DriverError> {
        let mut native = native_transaction(transaction);
        esp!(unsafe { spi_device_transmit(*handle, &mut native as *mut _) })
            .map_err(driver_error)?;
        finish(transaction, &native);
        Ok(())
    }

    fn acquire_bus(&mut self, handle: &spi_device_handle_t) -> Result<(), DriverError> {
        esp!(unsafe { spi_device_acquire_bus(*handle, BLOCK) }).map_err(driver_error)
    }

    fn release_bus(&mut self, handle: &spi_device_handle_t) -> Result<(), DriverError> {
        unsafe { spi_device_release_bus(*handle) };
        Ok(())
    }
}
