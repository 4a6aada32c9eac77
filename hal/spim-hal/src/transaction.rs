//! Native transaction descriptor
//!
//! A transaction is one chip-select assertion on the bus:
//!
//! ```text
//! CS  ‾‾\___________________________________________/‾‾
//!        [ command ][ address ][ dummy ][   data   ]
//! ```
//!
//! Command and address widths come from the device configuration; a zero
//! width skips the phase. Data lengths are in bits.

use core::ops::{BitOr, BitOrAssign};

/// Bytes that fit in the inline transmit/receive fields
pub const INLINE_DATA_LEN: usize = 4;

/// Transaction flags
///
/// Bit values match the native driver's `SPI_TRANS_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransactionFlags(u32);

impl TransactionFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Receive into the inline field instead of a buffer
    pub const USE_RXDATA: Self = Self(1 << 2);
    /// Transmit from the inline field instead of a buffer
    pub const USE_TXDATA: Self = Self(1 << 3);
    /// Keep CS asserted after this transaction (bus must be acquired)
    pub const CS_KEEP_ACTIVE: Self = Self(1 << 8);

    /// Raw bit value for the native driver
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TransactionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TransactionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Transmit data source
#[derive(Debug, Default)]
pub enum TxBuffer<'a> {
    /// Nothing to send
    #[default]
    None,
    /// Up to [`INLINE_DATA_LEN`] bytes carried inside the descriptor
    Inline([u8; INLINE_DATA_LEN]),
    /// Caller-owned buffer
    Slice(&'a [u8]),
}

/// Receive data destination
#[derive(Debug, Default)]
pub enum RxBuffer<'a> {
    /// Discard received data
    #[default]
    None,
    /// Up to [`INLINE_DATA_LEN`] bytes written inside the descriptor
    Inline([u8; INLINE_DATA_LEN]),
    /// Caller-owned buffer
    Slice(&'a mut [u8]),
    /// Caller-owned buffer that is also the transmit source
    ///
    /// Each byte is sent and then overwritten with the byte received.
    InPlace(&'a mut [u8]),
}

/// A single transaction
#[derive(Debug, Default)]
pub struct Transaction<'a> {
    /// Command phase value (width set by the device)
    pub cmd: u16,
    /// Address phase value (width set by the device)
    pub addr: u64,
    /// Total data length in bits
    pub length: usize,
    /// Receive length in bits, 0 to use `length` (full-duplex)
    pub rx_length: usize,
    /// Transaction flags
    pub flags: TransactionFlags,
    /// Transmit source
    pub tx: TxBuffer<'a>,
    /// Receive destination
    pub rx: RxBuffer<'a>,
}

impl<'a> Transaction<'a> {
    /// Transaction that sends `data`
    ///
    /// Payloads of up to [`INLINE_DATA_LEN`] bytes are carried inline.
    pub fn write(data: &'a [u8]) -> Self {
        let mut t = Self {
            length: data.len() * 8,
            ..Self::default()
        };
        if data.len() <= INLINE_DATA_LEN {
            let mut inline = [0u8; INLINE_DATA_LEN];
            inline[..data.len()].copy_from_slice(data);
            t.tx = TxBuffer::Inline(inline);
            t.flags |= TransactionFlags::USE_TXDATA;
        } else {
            t.tx = TxBuffer::Slice(data);
        }
        t
    }

    /// Transaction that receives `len` bytes into the inline field
    ///
    /// # Panics
    /// Never; `len` is clamped to [`INLINE_DATA_LEN`].
    pub fn read_inline(len: usize) -> Self {
        let len = len.min(INLINE_DATA_LEN);
        Self {
            length: len * 8,
            rx_length: len * 8,
            flags: TransactionFlags::USE_RXDATA,
            rx: RxBuffer::Inline([0u8; INLINE_DATA_LEN]),
            ..Self::default()
        }
    }

    /// Transaction that receives into `out`
    pub fn read(out: &'a mut [u8]) -> Self {
        let bits = out.len() * 8;
        Self {
            length: bits,
            rx_length: bits,
            rx: RxBuffer::Slice(out),
            ..Self::default()
        }
    }

    /// Full-duplex transaction that sends `buf` and receives into it
    pub fn transfer_in_place(buf: &'a mut [u8]) -> Self {
        let bits = buf.len() * 8;
        Self {
            length: bits,
            rx_length: bits,
            rx: RxBuffer::InPlace(buf),
            ..Self::default()
        }
    }

    /// Set the command and address phase values
    pub fn with_phases(mut self, cmd: u16, addr: u64) -> Self {
        self.cmd = cmd;
        self.addr = addr;
        self
    }

    /// Add flags
    pub fn with_flags(mut self, flags: TransactionFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Bytes sent in the data phase
    pub fn tx_bytes(&self) -> &[u8] {
        let len = self.length / 8;
        match &self.tx {
            TxBuffer::None => match &self.rx {
                RxBuffer::InPlace(data) => data,
                _ => &[],
            },
            TxBuffer::Inline(data) => &data[..len.min(INLINE_DATA_LEN)],
            TxBuffer::Slice(data) => data,
        }
    }

    /// Receive length in bytes, resolving the full-duplex default
    pub fn rx_len(&self) -> usize {
        if self.rx_length == 0 {
            self.length / 8
        } else {
            self.rx_length / 8
        }
    }

    /// Inline receive bytes after the transfer completed
    pub fn rx_data(&self) -> &[u8] {
        match &self.rx {
            RxBuffer::Inline(data) => &data[..self.rx_len().min(INLINE_DATA_LEN)],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_write_goes_inline() {
        let data = [0xDE, 0xAD];
        let t = Transaction::write(&data);

        assert_eq!(t.length, 16);
        assert_eq!(t.rx_length, 0);
        assert!(t.flags.contains(TransactionFlags::USE_TXDATA));
        assert!(matches!(t.tx, TxBuffer::Inline([0xDE, 0xAD, 0, 0])));
        assert_eq!(t.tx_bytes(), &data);
    }

    #[test]
    fn test_large_write_uses_slice() {
        let data = [1u8, 2, 3, 4, 5];
        let t = Transaction::write(&data);

        assert_eq!(t.length, 40);
        assert!(!t.flags.contains(TransactionFlags::USE_TXDATA));
        assert_eq!(t.tx_bytes(), &data);
    }

    #[test]
    fn test_read_lengths() {
        let mut out = [0u8; 10];
        let t = Transaction::read(&mut out);
        assert_eq!(t.length, 80);
        assert_eq!(t.rx_length, 80);
        assert_eq!(t.rx_len(), 10);
        assert!(matches!(t.tx, TxBuffer::None));
    }

    #[test]
    fn test_in_place_sends_its_buffer() {
        let mut buf = [0x9F, 0x00, 0x00];
        let t = Transaction::transfer_in_place(&mut buf);
        assert_eq!(t.length, 24);
        assert_eq!(t.rx_len(), 3);
        assert_eq!(t.tx_bytes(), &[0x9F, 0x00, 0x00]);
        assert!(t.rx_data().is_empty());
    }

    #[test]
    fn test_inline_read_clamps() {
        let t = Transaction::read_inline(9);
        assert_eq!(t.rx_len(), INLINE_DATA_LEN);
        assert!(t.flags.contains(TransactionFlags::USE_RXDATA));
        assert_eq!(t.rx_data(), &[0, 0, 0, 0]);
    }

    proptest! {
        #[test]
        fn prop_write_carries_every_byte(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let t = Transaction::write(&data);
            prop_assert_eq!(t.length, data.len() * 8);
            prop_assert_eq!(t.tx_bytes(), &data[..]);
            prop_assert_eq!(
                t.flags.contains(TransactionFlags::USE_TXDATA),
                data.len() <= INLINE_DATA_LEN
            );
        }
    }

    #[test]
    fn test_phases() {
        let t = Transaction::write(&[0x01]).with_phases(0x9F, 0x0012_3456);
        assert_eq!(t.cmd, 0x9F);
        assert_eq!(t.addr, 0x0012_3456);

        let t = t.with_flags(TransactionFlags::CS_KEEP_ACTIVE);
        assert!(t.flags.contains(TransactionFlags::CS_KEEP_ACTIVE | TransactionFlags::USE_TXDATA));
    }
}
