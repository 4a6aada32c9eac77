//! Register-addressed SPI peripherals
//!
//! Many sensors and converters expose a bank of 8-bit registers. The
//! register number travels in the address phase and a read is signalled by
//! a flag bit in the address, typically the MSB:
//!
//! ```text
//! [ R/W | reg(6:0) ][ data ... ]
//! ```
//!
//! The device must be attached with `cmd_addr_bits >= 8`.

use spim_core::{SpiDevice, SpiError, SpiMaster};
use spim_hal::SpiMasterDriver;

/// Read flag used by most 8-bit register peripherals
pub const READ_FLAG_MSB: u64 = 0x80;

/// Largest block handled by the multi-register calls
pub const MAX_BLOCK: usize = 64;

/// Register device errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Underlying SPI error
    Spi(SpiError),
    /// Device attached with an address phase narrower than 8 bits
    AddressTooNarrow,
    /// Block longer than [`MAX_BLOCK`]
    BlockTooLong,
    /// Register number overlaps the read flag
    InvalidRegister(u8),
}

impl From<SpiError> for RegisterError {
    fn from(e: SpiError) -> Self {
        RegisterError::Spi(e)
    }
}

/// A register-addressed peripheral
#[derive(Debug)]
pub struct RegisterDevice<H> {
    device: SpiDevice<H>,
    read_flag: u64,
}

impl<H> RegisterDevice<H> {
    /// Wrap an attached device, using [`READ_FLAG_MSB`] for reads
    pub fn new(device: SpiDevice<H>) -> Result<Self, RegisterError> {
        if device.cmd_addr_bits() < 8 {
            return Err(RegisterError::AddressTooNarrow);
        }
        Ok(Self {
            device,
            read_flag: READ_FLAG_MSB,
        })
    }

    /// Use a different read flag (0 for peripherals without one)
    pub fn with_read_flag(mut self, flag: u64) -> Self {
        self.read_flag = flag;
        self
    }

    /// Underlying device
    pub fn device(&self) -> &SpiDevice<H> {
        &self.device
    }

    /// Give back the underlying device
    pub fn into_device(self) -> SpiDevice<H> {
        self.device
    }

    fn check_register(&self, reg: u8) -> Result<u64, RegisterError> {
        let addr = u64::from(reg);
        if addr & self.read_flag != 0 {
            return Err(RegisterError::InvalidRegister(reg));
        }
        Ok(addr)
    }

    /// Read one register
    pub fn read_register<D>(&self, master: &mut SpiMaster<D>, reg: u8) -> Result<u8, RegisterError>
    where
        D: SpiMasterDriver<Handle = H>,
    {
        let mut value = [0u8; 1];
        self.read_registers(master, reg, &mut value)?;
        Ok(value[0])
    }

    /// Read consecutive registers starting at `reg`
    pub fn read_registers<D>(
        &self,
        master: &mut SpiMaster<D>,
        reg: u8,
        out: &mut [u8],
    ) -> Result<(), RegisterError>
    where
        D: SpiMasterDriver<Handle = H>,
    {
        let addr = self.check_register(reg)?;
        if out.len() > MAX_BLOCK {
            return Err(RegisterError::BlockTooLong);
        }
        master.receive(&self.device, addr | self.read_flag, out)?;
        Ok(())
    }

    /// Write one register
    pub fn write_register<D>(
        &self,
        master: &mut SpiMaster<D>,
        reg: u8,
        value: u8,
    ) -> Result<(), RegisterError>
    where
        D: SpiMasterDriver<Handle = H>,
    {
        self.write_registers(master, reg, &[value])
    }

    /// Write consecutive registers starting at `reg`
    pub fn write_registers<D>(
        &self,
        master: &mut SpiMaster<D>,
        reg: u8,
        values: &[u8],
    ) -> Result<(), RegisterError>
    where
        D: SpiMasterDriver<Handle = H>,
    {
        let addr = self.check_register(reg)?;
        if values.len() > MAX_BLOCK {
            return Err(RegisterError::BlockTooLong);
        }
        master.transmit(&self.device, addr, values)?;
        Ok(())
    }

    /// Read-modify-write: clear `mask` bits then set `bits & mask`
    pub fn modify_register<D>(
        &self,
        master: &mut SpiMaster<D>,
        reg: u8,
        mask: u8,
        bits: u8,
    ) -> Result<u8, RegisterError>
    where
        D: SpiMasterDriver<Handle = H>,
    {
        let current = self.read_register(master, reg)?;
        let value = (current & !mask) | (bits & mask);
        if value != current {
            self.write_register(master, reg, value)?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spim_core::SpiSettings;
    use spim_hal::{
        BusConfig, DeviceInterfaceConfig, DmaChannel, DriverError, RxBuffer, SpiHost,
        Transaction,
    };

    /// Mock peripheral with a 128-register bank
    struct MockRegisters {
        regs: [u8; 128],
        writes: usize,
    }

    impl MockRegisters {
        fn new() -> Self {
            Self {
                regs: [0; 128],
                writes: 0,
            }
        }

        fn run(&mut self, t: &mut Transaction<'_>) {
            let reg = (t.addr & 0x7F) as usize;
            if t.addr & READ_FLAG_MSB != 0 {
                let len = t.rx_len();
                let regs = &self.regs;
                let fill = |out: &mut [u8]| {
                    for (i, b) in out[..len].iter_mut().enumerate() {
                        *b = regs[reg + i];
                    }
                };
                match &mut t.rx {
                    RxBuffer::Inline(data) => fill(&mut data[..]),
                    RxBuffer::Slice(data) | RxBuffer::InPlace(data) => fill(&mut data[..]),
                    RxBuffer::None => {}
                }
            } else {
                let len = t.tx_bytes().len();
                self.regs[reg..reg + len].copy_from_slice(t.tx_bytes());
                self.writes += 1;
            }
        }
    }

    impl SpiMasterDriver for MockRegisters {
        type Handle = ();

        fn bus_initialize(
            &mut self,
            _host: SpiHost,
            _config: &BusConfig,
            _dma: DmaChannel,
        ) -> Result<(), DriverError> {
            Ok(())
        }

        fn bus_free(&mut self, _host: SpiHost) -> Result<(), DriverError> {
            Ok(())
        }

        fn bus_add_device(
            &mut self,
            _host: SpiHost,
            _config: &DeviceInterfaceConfig,
        ) -> Result<(), DriverError> {
            Ok(())
        }

        fn bus_remove_device(&mut self, _handle: &()) -> Result<(), DriverError> {
            Ok(())
        }

        fn polling_transmit(&mut self, _: &(), t: &mut Transaction<'_>) -> Result<(), DriverError> {
            self.run(t);
            Ok(())
        }

        fn transmit(&mut self, _: &(), t: &mut Transaction<'_>) -> Result<(), DriverError> {
            self.run(t);
            Ok(())
        }

        fn acquire_bus(&mut self, _: &()) -> Result<(), DriverError> {
            Ok(())
        }

        fn release_bus(&mut self, _: &()) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn setup() -> (SpiMaster<MockRegisters>, RegisterDevice<()>) {
        let mut master = SpiMaster::new(MockRegisters::new());
        let settings = SpiSettings::new(SpiHost::Spi2, 19, 23, 18, 5).with_cmd_addr_bits(8);
        let device = master.init(&settings).unwrap();
        (master, RegisterDevice::new(device).unwrap())
    }

    #[test]
    fn test_requires_address_phase() {
        let mut master = SpiMaster::new(MockRegisters::new());
        let settings = SpiSettings::new(SpiHost::Spi2, 19, 23, 18, 5);
        let device = master.init(&settings).unwrap();
        assert_eq!(
            RegisterDevice::new(device).unwrap_err(),
            RegisterError::AddressTooNarrow
        );
    }

    #[test]
    fn test_write_then_read() {
        let (mut master, dev) = setup();

        dev.write_register(&mut master, 0x20, 0x47).unwrap();
        assert_eq!(master.driver().regs[0x20], 0x47);
        assert_eq!(dev.read_register(&mut master, 0x20).unwrap(), 0x47);
    }

    #[test]
    fn test_block_access() {
        let (mut master, dev) = setup();

        let values = [1u8, 2, 3, 4, 5, 6];
        dev.write_registers(&mut master, 0x28, &values).unwrap();

        let mut out = [0u8; 6];
        dev.read_registers(&mut master, 0x28, &mut out).unwrap();
        assert_eq!(out, values);

        let big = [0u8; MAX_BLOCK + 1];
        assert_eq!(
            dev.write_registers(&mut master, 0, &big),
            Err(RegisterError::BlockTooLong)
        );
    }

    #[test]
    fn test_register_overlapping_read_flag() {
        let (mut master, dev) = setup();

        assert_eq!(
            dev.write_register(&mut master, 0xA0, 0x01),
            Err(RegisterError::InvalidRegister(0xA0))
        );
        assert_eq!(
            dev.read_register(&mut master, 0x80),
            Err(RegisterError::InvalidRegister(0x80))
        );
        assert_eq!(master.driver().writes, 0);
        assert_eq!(master.driver().regs[0x20], 0);

        // Without a read flag the whole range is addressable
        let dev = dev.with_read_flag(0);
        assert!(dev.write_register(&mut master, 0x7F, 0x01).is_ok());
    }

    #[test]
    fn test_modify_register() {
        let (mut master, dev) = setup();
        master.driver_mut().regs[0x23] = 0b1010_0000;

        let value = dev
            .modify_register(&mut master, 0x23, 0b0000_1111, 0b0000_0101)
            .unwrap();
        assert_eq!(value, 0b1010_0101);
        assert_eq!(master.driver().writes, 1);

        // No change, no write
        dev.modify_register(&mut master, 0x23, 0b0000_1111, 0b0000_0101)
            .unwrap();
        assert_eq!(master.driver().writes, 1);
    }
}
