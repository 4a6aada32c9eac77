//! SPI master handler
//!
//! [`SpiMaster`] owns the native driver and issues blocking transactions on
//! behalf of the devices attached through it.
//!
//! # Usage
//!
//! ```ignore
//! let mut master = SpiMaster::new(driver);
//! let settings = SpiSettings::new(SpiHost::Spi2, 19, 23, 18, 5).with_cmd_addr_bits(8);
//! let dev = master.init(&settings)?;
//!
//! master.transmit(&dev, 0x20, &[0x47])?;
//! let mut id = [0u8; 1];
//! master.receive(&dev, 0x0F, &mut id)?;
//! ```

use spim_hal::{
    RxBuffer, SpiHost, SpiMasterDriver, Transaction, TransactionFlags, TxBuffer, INLINE_DATA_LEN,
};

use crate::bus::{BusRegistry, DeviceSlot};
use crate::error::SpiError;
use crate::settings::SpiSettings;
use crate::translate::{self, DMA_CHANNEL};

/// How a device's transactions are run by the native driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferMode {
    /// Busy-wait on the peripheral
    Polling,
    /// Queue and wait for the completion interrupt
    Interrupt,
}

/// A device attached through [`SpiMaster::init`]
#[derive(Debug)]
pub struct SpiDevice<H> {
    id: u32,
    host: SpiHost,
    handle: H,
    mode: TransferMode,
    max_transfer: usize,
    cmd_addr_bits: u8,
    half_duplex: bool,
}

impl<H> SpiDevice<H> {
    /// Host the device is attached to
    pub fn host(&self) -> SpiHost {
        self.host
    }

    /// Native driver handle
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Transfer mode
    pub fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    /// Largest buffer accepted per transaction
    pub fn max_transfer(&self) -> usize {
        self.max_transfer
    }

    /// Width of the command and address phases
    pub fn cmd_addr_bits(&self) -> u8 {
        self.cmd_addr_bits
    }

    /// Whether the device runs half-duplex
    pub fn is_half_duplex(&self) -> bool {
        self.half_duplex
    }

    /// Address phase value, truncated to the configured width
    ///
    /// With a zero width no address data is sent.
    pub fn address(&self, addr: u64) -> u64 {
        match self.cmd_addr_bits {
            0 => 0,
            bits if bits >= 64 => addr,
            bits => addr & ((1u64 << bits) - 1),
        }
    }

    fn check_len(&self, len: usize) -> Result<(), SpiError> {
        if len > self.max_transfer {
            Err(SpiError::TransferTooLarge)
        } else {
            Ok(())
        }
    }
}

/// SPI master handler
pub struct SpiMaster<D: SpiMasterDriver> {
    driver: D,
    registry: BusRegistry,
    next_id: u32,
}

impl<D: SpiMasterDriver> SpiMaster<D> {
    /// Wrap a native driver
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            registry: BusRegistry::new(),
            next_id: 0,
        }
    }

    /// Native driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Native driver, mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Unwrap the native driver
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Bus bookkeeping
    pub fn registry(&self) -> &BusRegistry {
        &self.registry
    }

    /// Initialize the bus (if needed) and attach a device
    ///
    /// The first device on a host initializes its bus. Later devices on the
    /// same host must use the same bus pins and max transfer size and a
    /// distinct chip select.
    pub fn init(&mut self, settings: &SpiSettings) -> Result<SpiDevice<D::Handle>, SpiError> {
        settings.validate()?;

        let host = settings.host;
        let bus_config = translate::bus_config(settings);
        let device_config = translate::device_config(settings);

        let fresh_bus = match self.registry.bus(host) {
            Some(bus) => {
                if bus.config != bus_config {
                    warn!("SPI bus {} already initialized with other pins", host);
                    return Err(SpiError::BusConflict);
                }
                if settings.cs.is_some_and(|cs| bus.has_cs(cs)) {
                    warn!("SPI bus {} already has a device on cs {}", host, settings.cs);
                    return Err(SpiError::DeviceExists);
                }
                if bus.is_full() {
                    return Err(SpiError::BusFull);
                }
                false
            }
            None => {
                debug!(
                    "Initializing SPI bus {}: mosi={} miso={} sclk={}",
                    host,
                    settings.mosi,
                    settings.miso,
                    settings.sclk
                );
                self.driver.bus_initialize(host, &bus_config, DMA_CHANNEL)?;
                self.registry.open(host, bus_config);
                true
            }
        };

        let handle = match self.driver.bus_add_device(host, &device_config) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to add SPI device on bus {}: {}", host, e);
                if fresh_bus {
                    self.free_bus(host);
                }
                return Err(e.into());
            }
        };

        let id = self.next_id;
        let slot = DeviceSlot {
            id,
            cs: settings.cs,
        };
        if let Err(e) = self.registry.attach(host, slot) {
            let _ = self.driver.bus_remove_device(&handle);
            if fresh_bus {
                self.free_bus(host);
            }
            return Err(e.into());
        }
        self.next_id = self.next_id.wrapping_add(1);

        let mode = if settings.intr_transfer {
            TransferMode::Interrupt
        } else {
            TransferMode::Polling
        };
        info!(
            "SPI device {} attached to bus {} ({} Hz, {})",
            id,
            host,
            settings.hz,
            mode
        );

        Ok(SpiDevice {
            id,
            host,
            handle,
            mode,
            max_transfer: translate::effective_max_transfer(settings),
            cmd_addr_bits: settings.cmd_addr_bits,
            half_duplex: settings.half_duplex,
        })
    }

    /// Detach a device, freeing its bus if it was the last one
    ///
    /// The device is unusable afterwards; further calls with it return
    /// [`SpiError::UnknownDevice`].
    pub fn release(&mut self, device: &SpiDevice<D::Handle>) -> Result<(), SpiError> {
        self.check_attached(device)?;
        self.driver.bus_remove_device(&device.handle)?;

        let remaining = self.registry.detach(device.host, device.id).unwrap_or(0);
        debug!("SPI device {} released, {} left on bus", device.id, remaining);
        if remaining == 0 {
            self.driver.bus_free(device.host)?;
            self.registry.close(device.host);
        }
        Ok(())
    }

    /// Send `data` to the device at address `addr`
    ///
    /// The command phase is zero. If the device has no command/address
    /// width, no address data is sent.
    pub fn transmit(
        &mut self,
        device: &SpiDevice<D::Handle>,
        addr: u64,
        data: &[u8],
    ) -> Result<(), SpiError> {
        if data.is_empty() {
            return Ok(());
        }
        device.check_len(data.len())?;

        let mut t = Transaction::write(data).with_phases(0, device.address(addr));
        self.execute(device, &mut t)
    }

    /// Read `out.len()` bytes from the device at address `addr`
    ///
    /// Like [`Self::transmit`], `addr` goes in the address phase and the
    /// command phase is zero, so the wire order is `[0][addr][data]`.
    pub fn receive(
        &mut self,
        device: &SpiDevice<D::Handle>,
        addr: u64,
        out: &mut [u8],
    ) -> Result<(), SpiError> {
        if out.is_empty() {
            return Ok(());
        }
        device.check_len(out.len())?;

        let addr = device.address(addr);
        if out.len() <= INLINE_DATA_LEN {
            let mut t = Transaction::read_inline(out.len()).with_phases(0, addr);
            self.execute(device, &mut t)?;
            out.copy_from_slice(t.rx_data());
            Ok(())
        } else {
            let mut t = Transaction::read(out).with_phases(0, addr);
            self.execute(device, &mut t)
        }
    }

    /// Full-duplex exchange: send `write` while reading into `read`
    ///
    /// The data phase lasts for the longer of the two buffers; `write` must
    /// be at least as long as `read`.
    pub fn transfer(
        &mut self,
        device: &SpiDevice<D::Handle>,
        addr: u64,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), SpiError> {
        self.transfer_with_flags(device, addr, write, read, TransactionFlags::NONE)
    }

    pub(crate) fn transfer_with_flags(
        &mut self,
        device: &SpiDevice<D::Handle>,
        addr: u64,
        write: &[u8],
        read: &mut [u8],
        flags: TransactionFlags,
    ) -> Result<(), SpiError> {
        if device.half_duplex {
            return Err(SpiError::HalfDuplexTransfer);
        }
        if write.len() < read.len() {
            return Err(SpiError::Driver(spim_hal::DriverError::InvalidArg));
        }
        if write.is_empty() {
            return Ok(());
        }
        device.check_len(write.len())?;

        let mut t = Transaction {
            addr: device.address(addr),
            length: write.len() * 8,
            rx_length: read.len() * 8,
            flags,
            tx: TxBuffer::Slice(write),
            rx: if read.is_empty() {
                RxBuffer::None
            } else {
                RxBuffer::Slice(read)
            },
            ..Transaction::default()
        };
        self.execute(device, &mut t)
    }

    /// Run a prepared transaction as-is
    pub fn execute(
        &mut self,
        device: &SpiDevice<D::Handle>,
        transaction: &mut Transaction<'_>,
    ) -> Result<(), SpiError> {
        self.check_attached(device)?;
        trace!(
            "SPI device {}: addr={=u64:#x} {} bits",
            device.id,
            transaction.addr,
            transaction.length
        );

        let result = match device.mode {
            TransferMode::Polling => self.driver.polling_transmit(&device.handle, transaction),
            TransferMode::Interrupt => self.driver.transmit(&device.handle, transaction),
        };
        result.map_err(|e| {
            warn!("SPI device {} transaction failed: {}", device.id, e);
            SpiError::Driver(e)
        })
    }

    /// Take exclusive use of the bus for `device`
    pub fn acquire_bus(&mut self, device: &SpiDevice<D::Handle>) -> Result<(), SpiError> {
        self.check_attached(device)?;
        self.driver.acquire_bus(&device.handle)?;
        Ok(())
    }

    /// Give up exclusive use of the bus
    pub fn release_bus(&mut self, device: &SpiDevice<D::Handle>) -> Result<(), SpiError> {
        self.check_attached(device)?;
        self.driver.release_bus(&device.handle)?;
        Ok(())
    }

    fn check_attached(&self, device: &SpiDevice<D::Handle>) -> Result<(), SpiError> {
        if self.registry.contains(device.host, device.id) {
            Ok(())
        } else {
            Err(SpiError::UnknownDevice)
        }
    }

    fn free_bus(&mut self, host: SpiHost) {
        if let Err(e) = self.driver.bus_free(host) {
            warn!("Failed to free SPI bus {}: {}", host, e);
        }
        self.registry.close(host);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording mock of the native driver

    extern crate alloc;

    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    use spim_hal::{
        BusConfig, DeviceInterfaceConfig, DmaChannel, DriverError, RxBuffer, SpiHost,
        SpiMasterDriver, Transaction, TransactionFlags,
    };

    /// A transaction as seen by the driver
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Record {
        pub handle: u32,
        pub polled: bool,
        pub cmd: u16,
        pub addr: u64,
        pub length: usize,
        pub rx_length: usize,
        pub flags: TransactionFlags,
        pub tx: Vec<u8>,
    }

    #[derive(Debug, Default)]
    pub struct MockDriver {
        pub buses: Vec<(SpiHost, BusConfig, DmaChannel)>,
        pub devices: Vec<(u32, SpiHost, DeviceInterfaceConfig)>,
        pub records: Vec<Record>,
        /// Bytes returned on MISO, 0xFF once exhausted
        pub miso: VecDeque<u8>,
        pub acquired: Option<u32>,
        pub fail_add_device: Option<DriverError>,
        pub fail_transmit: Option<DriverError>,
        next_handle: u32,
    }

    impl MockDriver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&mut self, bytes: &[u8]) {
            self.miso.extend(bytes.iter().copied());
        }

        fn record(&mut self, handle: u32, polled: bool, t: &mut Transaction<'_>) {
            self.records.push(Record {
                handle,
                polled,
                cmd: t.cmd,
                addr: t.addr,
                length: t.length,
                rx_length: t.rx_length,
                flags: t.flags,
                tx: t.tx_bytes().to_vec(),
            });

            let rx_len = t.rx_len();
            let miso = &mut self.miso;
            let mut next = || miso.pop_front().unwrap_or(0xFF);
            match &mut t.rx {
                RxBuffer::None => {}
                RxBuffer::Inline(data) => data[..rx_len].iter_mut().for_each(|b| *b = next()),
                RxBuffer::Slice(data) | RxBuffer::InPlace(data) => {
                    data[..rx_len].iter_mut().for_each(|b| *b = next())
                }
            }
        }
    }

    impl SpiMasterDriver for MockDriver {
        type Handle = u32;

        fn bus_initialize(
            &mut self,
            host: SpiHost,
            config: &BusConfig,
            dma: DmaChannel,
        ) -> Result<(), DriverError> {
            if self.buses.iter().any(|(h, _, _)| *h == host) {
                return Err(DriverError::InvalidState);
            }
            self.buses.push((host, *config, dma));
            Ok(())
        }

        fn bus_free(&mut self, host: SpiHost) -> Result<(), DriverError> {
            if self.devices.iter().any(|(_, h, _)| *h == host) {
                return Err(DriverError::InvalidState);
            }
            self.buses.retain(|(h, _, _)| *h != host);
            Ok(())
        }

        fn bus_add_device(
            &mut self,
            host: SpiHost,
            config: &DeviceInterfaceConfig,
        ) -> Result<u32, DriverError> {
            if let Some(e) = self.fail_add_device {
                return Err(e);
            }
            if !self.buses.iter().any(|(h, _, _)| *h == host) {
                return Err(DriverError::InvalidState);
            }
            let handle = self.next_handle;
            self.next_handle += 1;
            self.devices.push((handle, host, *config));
            Ok(handle)
        }

        fn bus_remove_device(&mut self, handle: &u32) -> Result<(), DriverError> {
            let before = self.devices.len();
            self.devices.retain(|(h, _, _)| h != handle);
            if self.devices.len() == before {
                return Err(DriverError::InvalidArg);
            }
            Ok(())
        }

        fn polling_transmit(
            &mut self,
            handle: &u32,
            t: &mut Transaction<'_>,
        ) -> Result<(), DriverError> {
            if let Some(e) = self.fail_transmit {
                return Err(e);
            }
            self.record(*handle, true, t);
            Ok(())
        }

        fn transmit(&mut self, handle: &u32, t: &mut Transaction<'_>) -> Result<(), DriverError> {
            if let Some(e) = self.fail_transmit {
                return Err(e);
            }
            self.record(*handle, false, t);
            Ok(())
        }

        fn acquire_bus(&mut self, handle: &u32) -> Result<(), DriverError> {
            if self.acquired.is_some() {
                return Err(DriverError::InvalidState);
            }
            self.acquired = Some(*handle);
            Ok(())
        }

        fn release_bus(&mut self, handle: &u32) -> Result<(), DriverError> {
            if self.acquired != Some(*handle) {
                return Err(DriverError::InvalidState);
            }
            self.acquired = None;
            Ok(())
        }
    }
}
