//! `embedded-hal` adapter
//!
//! Exposes an attached device as an [`embedded_hal::spi::SpiDevice`] so
//! ecosystem drivers can run on top of the handler. The bus is acquired for
//! the whole operation list and chip select stays asserted until the last
//! transaction that moves data.
//!
//! Operations carry no command/address phase, so only devices attached
//! with `cmd_addr_bits = 0` can be bound.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice as EhSpiDevice};

use spim_hal::{SpiMasterDriver, Transaction, TransactionFlags};

use crate::error::SpiError;
use crate::master::{SpiDevice, SpiMaster};

/// A device bound to its master, usable as an `embedded-hal` SPI device
pub struct BoundDevice<'m, D: SpiMasterDriver, T> {
    master: &'m mut SpiMaster<D>,
    device: &'m SpiDevice<D::Handle>,
    delay: T,
}

impl<D: SpiMasterDriver> SpiMaster<D> {
    /// Bind `device` for use through `embedded-hal`
    ///
    /// `delay` services [`Operation::DelayNs`]. Devices with a
    /// command/address phase are rejected with [`SpiError::AddressPhase`].
    pub fn bind<'m, T: DelayNs>(
        &'m mut self,
        device: &'m SpiDevice<D::Handle>,
        delay: T,
    ) -> Result<BoundDevice<'m, D, T>, SpiError> {
        if device.cmd_addr_bits() != 0 {
            return Err(SpiError::AddressPhase);
        }
        Ok(BoundDevice {
            master: self,
            device,
            delay,
        })
    }
}

fn hold_flags(hold: bool) -> TransactionFlags {
    if hold {
        TransactionFlags::CS_KEEP_ACTIVE
    } else {
        TransactionFlags::NONE
    }
}

/// Bytes clocked by an operation; 0 means no transaction is issued
fn data_len(op: &Operation<'_, u8>) -> usize {
    match op {
        Operation::DelayNs(_) => 0,
        Operation::Write(data) => data.len(),
        Operation::Read(out) => out.len(),
        Operation::Transfer(read, write) => read.len().max(write.len()),
        Operation::TransferInPlace(buf) => buf.len(),
    }
}

impl<D: SpiMasterDriver, T: DelayNs> BoundDevice<'_, D, T> {
    fn write_chunks(&mut self, data: &[u8], hold: bool) -> Result<(), SpiError> {
        let max = self.device.max_transfer();
        let count = data.len().div_ceil(max);
        for (i, chunk) in data.chunks(max).enumerate() {
            let flags = hold_flags(hold || i + 1 < count);
            let mut t = Transaction::write(chunk).with_flags(flags);
            self.master.execute(self.device, &mut t)?;
        }
        Ok(())
    }

    fn read_chunks(&mut self, out: &mut [u8], hold: bool) -> Result<(), SpiError> {
        let max = self.device.max_transfer();
        let count = out.len().div_ceil(max);
        for (i, chunk) in out.chunks_mut(max).enumerate() {
            let flags = hold_flags(hold || i + 1 < count);
            let mut t = Transaction::read(chunk).with_flags(flags);
            self.master.execute(self.device, &mut t)?;
        }
        Ok(())
    }

    /// Full-duplex over the common length, then the longer side alone
    fn exchange(&mut self, read: &mut [u8], write: &[u8], hold: bool) -> Result<(), SpiError> {
        if self.device.is_half_duplex() {
            return Err(SpiError::HalfDuplexTransfer);
        }

        let common = read.len().min(write.len());
        let (write, write_tail) = write.split_at(common);
        let (read, read_tail) = read.split_at_mut(common);
        let tail = !write_tail.is_empty() || !read_tail.is_empty();

        let max = self.device.max_transfer();
        let count = common.div_ceil(max);
        for (i, (w, r)) in write.chunks(max).zip(read.chunks_mut(max)).enumerate() {
            let flags = hold_flags(hold || tail || i + 1 < count);
            self.master.transfer_with_flags(self.device, 0, w, r, flags)?;
        }

        // Whatever is clocked past the shorter buffer is implementation-defined
        if !write_tail.is_empty() {
            self.write_chunks(write_tail, hold)?;
        }
        if !read_tail.is_empty() {
            self.read_chunks(read_tail, hold)?;
        }
        Ok(())
    }

    fn exchange_in_place(&mut self, buf: &mut [u8], hold: bool) -> Result<(), SpiError> {
        if self.device.is_half_duplex() {
            return Err(SpiError::HalfDuplexTransfer);
        }

        let max = self.device.max_transfer();
        let count = buf.len().div_ceil(max);
        for (i, chunk) in buf.chunks_mut(max).enumerate() {
            let flags = hold_flags(hold || i + 1 < count);
            let mut t = Transaction::transfer_in_place(chunk).with_flags(flags);
            self.master.execute(self.device, &mut t)?;
        }
        Ok(())
    }

    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SpiError> {
        // CS is released by the last operation that issues a transaction
        let last = operations.iter().rposition(|op| data_len(op) > 0);

        for (i, op) in operations.iter_mut().enumerate() {
            let hold = last.is_some_and(|l| i < l);
            match op {
                Operation::DelayNs(ns) => self.delay.delay_ns(*ns),
                Operation::Write(data) => self.write_chunks(data, hold)?,
                Operation::Read(out) => self.read_chunks(out, hold)?,
                Operation::Transfer(read, write) => self.exchange(read, write, hold)?,
                Operation::TransferInPlace(buf) => self.exchange_in_place(buf, hold)?,
            }
        }
        Ok(())
    }
}

impl<D: SpiMasterDriver, T> ErrorType for BoundDevice<'_, D, T> {
    type Error = SpiError;
}

impl<D: SpiMasterDriver, T: DelayNs> EhSpiDevice<u8> for BoundDevice<'_, D, T> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SpiError> {
        self.master.acquire_bus(self.device)?;
        let result = self.run(operations);
        let released = self.master.release_bus(self.device);
        result.and(released)
    }
}
