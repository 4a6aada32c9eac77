//! JEDEC SPI NOR flash
//!
//! Works over any [`embedded_hal::spi::SpiDevice`]; on top of the handler,
//! bind a device attached with `cmd_addr_bits = 0` via
//! [`spim_core::SpiMaster::bind`].
//!
//! # Command format
//!
//! Every command is one opcode byte, optionally followed by a 24-bit
//! big-endian address, then data:
//!
//! ```text
//! [ opcode ][ addr(23:16) ][ addr(15:8) ][ addr(7:0) ][ data ... ]
//! ```

use embedded_hal::spi::{Operation, SpiDevice};

/// Flash opcodes
pub mod cmd {
    /// Write enable
    pub const WRITE_ENABLE: u8 = 0x06;
    /// Read status register 1
    pub const READ_STATUS: u8 = 0x05;
    /// Read data
    pub const READ: u8 = 0x03;
    /// Program up to one page
    pub const PAGE_PROGRAM: u8 = 0x02;
    /// Erase a 4 KiB sector
    pub const SECTOR_ERASE: u8 = 0x20;
    /// Erase the whole chip
    pub const CHIP_ERASE: u8 = 0xC7;
    /// Read JEDEC manufacturer and device id
    pub const JEDEC_ID: u8 = 0x9F;
}

/// Status register: write in progress
pub const STATUS_BUSY: u8 = 0x01;
/// Status register: write enable latch
pub const STATUS_WEL: u8 = 0x02;

/// Program page size
pub const PAGE_SIZE: u32 = 256;
/// Smallest erase unit
pub const SECTOR_SIZE: u32 = 4096;

/// Status polls before [`FlashError::Timeout`]
const MAX_BUSY_POLLS: u32 = 1_000_000;

/// Flash errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError<E> {
    /// Underlying SPI error
    Spi(E),
    /// Still busy after the polling budget
    Timeout,
    /// Access beyond the chip capacity
    OutOfBounds,
    /// Address not aligned to the erase unit
    NotAligned,
    /// Write enable latch did not set
    WriteProtected,
    /// JEDEC id reads as all zeros or all ones (no chip)
    NoDevice,
}

/// JEDEC identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JedecId {
    /// Manufacturer id
    pub manufacturer: u8,
    /// Memory type
    pub memory_type: u8,
    /// Capacity code, log2 of the size in bytes
    pub capacity: u8,
}

impl JedecId {
    /// Capacity in bytes, if the code is plausible
    pub fn capacity_bytes(&self) -> Option<u32> {
        match self.capacity {
            10..=31 => Some(1u32 << self.capacity),
            _ => None,
        }
    }
}

/// SPI NOR flash driver
pub struct SpiFlash<S> {
    spi: S,
    capacity: u32,
}

fn address(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

impl<S: SpiDevice> SpiFlash<S> {
    /// Create a driver for a chip of known capacity
    pub fn new(spi: S, capacity: u32) -> Self {
        Self { spi, capacity }
    }

    /// Read the JEDEC id and size the driver from it
    pub fn identify(spi: S) -> Result<(Self, JedecId), FlashError<S::Error>> {
        let mut flash = Self::new(spi, 0);
        let id = flash.read_jedec_id()?;
        flash.capacity = id.capacity_bytes().ok_or(FlashError::NoDevice)?;
        Ok((flash, id))
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Give back the SPI device
    pub fn release(self) -> S {
        self.spi
    }

    /// Read the JEDEC id
    pub fn read_jedec_id(&mut self) -> Result<JedecId, FlashError<S::Error>> {
        let mut id = [0u8; 3];
        self.spi
            .transaction(&mut [
                Operation::Write(&[cmd::JEDEC_ID]),
                Operation::Read(&mut id),
            ])
            .map_err(FlashError::Spi)?;

        if id == [0x00; 3] || id == [0xFF; 3] {
            return Err(FlashError::NoDevice);
        }
        Ok(JedecId {
            manufacturer: id[0],
            memory_type: id[1],
            capacity: id[2],
        })
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> Result<u8, FlashError<S::Error>> {
        let mut status = [0u8; 1];
        self.spi
            .transaction(&mut [
                Operation::Write(&[cmd::READ_STATUS]),
                Operation::Read(&mut status),
            ])
            .map_err(FlashError::Spi)?;
        Ok(status[0])
    }

    /// Poll until no write or erase is in progress
    pub fn wait_idle(&mut self) -> Result<(), FlashError<S::Error>> {
        for _ in 0..MAX_BUSY_POLLS {
            if self.read_status()? & STATUS_BUSY == 0 {
                return Ok(());
            }
        }
        Err(FlashError::Timeout)
    }

    /// Set the write enable latch
    pub fn write_enable(&mut self) -> Result<(), FlashError<S::Error>> {
        self.spi
            .write(&[cmd::WRITE_ENABLE])
            .map_err(FlashError::Spi)?;
        if self.read_status()? & STATUS_WEL == 0 {
            return Err(FlashError::WriteProtected);
        }
        Ok(())
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<(), FlashError<S::Error>> {
        let end = u64::from(addr) + len as u64;
        if end > u64::from(self.capacity) {
            return Err(FlashError::OutOfBounds);
        }
        Ok(())
    }

    /// Read `out.len()` bytes from `addr`
    pub fn read(&mut self, addr: u32, out: &mut [u8]) -> Result<(), FlashError<S::Error>> {
        self.check_range(addr, out.len())?;
        let [a2, a1, a0] = address(addr);
        self.spi
            .transaction(&mut [
                Operation::Write(&[cmd::READ, a2, a1, a0]),
                Operation::Read(out),
            ])
            .map_err(FlashError::Spi)
    }

    /// Program `data` at `addr`, splitting at page boundaries
    ///
    /// The target range must be erased.
    pub fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError<S::Error>> {
        self.check_range(addr, data.len())?;

        let mut addr = addr;
        let mut rest = data;
        while !rest.is_empty() {
            let room = (PAGE_SIZE - addr % PAGE_SIZE) as usize;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));

            self.write_enable()?;
            let [a2, a1, a0] = address(addr);
            self.spi
                .transaction(&mut [
                    Operation::Write(&[cmd::PAGE_PROGRAM, a2, a1, a0]),
                    Operation::Write(chunk),
                ])
                .map_err(FlashError::Spi)?;
            self.wait_idle()?;

            addr += chunk.len() as u32;
            rest = tail;
        }
        Ok(())
    }

    /// Erase the 4 KiB sector at `addr`
    pub fn sector_erase(&mut self, addr: u32) -> Result<(), FlashError<S::Error>> {
        if addr % SECTOR_SIZE != 0 {
            return Err(FlashError::NotAligned);
        }
        self.check_range(addr, SECTOR_SIZE as usize)?;

        self.write_enable()?;
        let [a2, a1, a0] = address(addr);
        self.spi
            .write(&[cmd::SECTOR_ERASE, a2, a1, a0])
            .map_err(FlashError::Spi)?;
        self.wait_idle()
    }

    /// Erase the whole chip
    pub fn chip_erase(&mut self) -> Result<(), FlashError<S::Error>> {
        self.write_enable()?;
        self.spi
            .write(&[cmd::CHIP_ERASE])
            .map_err(FlashError::Spi)?;
        self.wait_idle()
    }
}
