//! Link-level checksums for DF1 frames.
//!
//! The DF1 wire format closes every frame with either a one-byte block check
//! character (BCC) or a two-byte CRC-16, selected by station configuration.
//! Both cover the unescaped application payload; the CRC additionally folds
//! in a synthetic ETX byte (0x03) whether or not the buffer ends in one,
//! which is part of the checksum definition rather than a framing detail.
//!
//! Both algorithms accept any byte iterator so callers can feed a contiguous
//! buffer or a chained view without copying.

use crc::{CRC_16_ARC, Crc};

/// Reflected CRC-16 with polynomial 0xA001 and zero init, the variant used
/// by the DF1 link layer. `CRC_16_ARC` is the catalogue name for the same
/// parameters.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Trailing byte folded into every CRC computation.
const ETX: u8 = 0x03;

/// Computes the block check character: the 8-bit two's complement of the
/// byte sum, so that the sum of the payload plus the BCC is 0 modulo 256.
pub fn bcc<I>(bytes: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let sum = bytes
        .into_iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(byte));
    sum.wrapping_neg()
}

/// Computes the DF1 CRC-16 over the payload plus the mandatory ETX mix-in.
pub fn crc16<I>(bytes: I) -> u16
where
    I: IntoIterator<Item = u8>,
{
    let mut digest = CRC16.digest();
    for byte in bytes {
        digest.update(&[byte]);
    }
    digest.update(&[ETX]);
    digest.finalize()
}

/// Checksum algorithm negotiated for a link.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ChecksumKind {
    /// One-byte block check character.
    Bcc,
    /// Two-byte CRC-16, emitted low byte first.
    #[default]
    Crc16,
}

impl ChecksumKind {
    /// Number of checksum octets this algorithm appends to a frame.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            ChecksumKind::Bcc => 1,
            ChecksumKind::Crc16 => 2,
        }
    }

    /// Canonical name used in diagnostics and CLI output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ChecksumKind::Bcc => "BCC",
            ChecksumKind::Crc16 => "CRC",
        }
    }

    /// Computes the checksum of `payload` in wire order.
    #[must_use]
    pub fn compute(self, payload: &[u8]) -> ChecksumBytes {
        match self {
            ChecksumKind::Bcc => ChecksumBytes::one(bcc(payload.iter().copied())),
            ChecksumKind::Crc16 => {
                let value = crc16(payload.iter().copied());
                ChecksumBytes::two(value.to_le_bytes())
            }
        }
    }

    /// Reports whether `received` matches the checksum of `payload`.
    #[must_use]
    pub fn verify(self, payload: &[u8], received: &[u8]) -> bool {
        self.compute(payload).as_slice() == received
    }
}

/// One or two checksum octets in wire order (CRC low byte first).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChecksumBytes {
    bytes: [u8; 2],
    len: usize,
}

impl ChecksumBytes {
    const fn one(byte: u8) -> Self {
        Self {
            bytes: [byte, 0],
            len: 1,
        }
    }

    const fn two(bytes: [u8; 2]) -> Self {
        Self { bytes, len: 2 }
    }

    /// Checksum octets in the order they appear on the wire.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}
