//! Little-endian byte and bit cursors over decompressed variant payloads.
use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

/// Sequential little-endian reader over a byte slice.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self{inner: Cursor::new(bytes)}
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.inner.read_u16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.inner.read_u32::<LittleEndian>()
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
        let remaining = self.remaining();
        if remaining.len() < n {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("requested {n} bytes, {} left", remaining.len())))
        }
        self.inner.set_position(self.inner.position() + n as u64);
        Ok(&remaining[..n])
    }

    /// Unread part of the slice.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        let bytes: &'a [u8] = *self.inner.get_ref();
        let position = (self.inner.position() as usize).min(bytes.len());
        &bytes[position..]
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }
}

impl Read for ByteCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Reads fixed-width unsigned integers from a little-endian bit stream.
///
/// Stream bit `k` is bit `k % 8` of byte `k / 8`. Value bit `i` of a group starting at `s` is stream bit `s + i`.
#[derive(Debug)]
pub struct BitReader<'a> {
    bytes : &'a [u8],
    offset: usize,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self{bytes, offset: 0}
    }

    /// Read the next `n_bits` (at most 32) bits, or `None` if the stream is too short.
    pub fn read(&mut self, n_bits: u8) -> Option<u32> {
        let n_bits = usize::from(n_bits);
        debug_assert!(n_bits <= 32);
        let end = self.offset + n_bits;
        if end > self.bytes.len() * 8 {
            return None
        }

        let mut value = 0u64;
        let mut written = 0;
        while written < n_bits {
            let position = self.offset + written;
            let shift = position % 8;
            let take = (8 - shift).min(n_bits - written);
            let bits = (u64::from(self.bytes[position / 8]) >> shift) & ((1 << take) - 1);
            value |= bits << written;
            written += take;
        }
        self.offset = end;
        Some(value as u32)
    }

    /// Advance the cursor by `n_bits` without decoding them.
    pub fn skip(&mut self, n_bits: usize) -> Option<()> {
        let end = self.offset + n_bits;
        (end <= self.bytes.len() * 8).then(|| self.offset = end)
    }

    #[must_use]
    pub fn bit_offset(&self) -> usize {
        self.offset
    }
}

/// Packs fixed-width unsigned integers into a little-endian bit stream, mirroring [`BitReader`].
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes : Vec<u8>,
    offset: usize,
}

impl BitWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the lowest `n_bits` bits of `value`.
    pub fn write(&mut self, value: u32, n_bits: u8) {
        for i in 0..usize::from(n_bits) {
            let k = self.offset + i;
            if k / 8 == self.bytes.len() {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                self.bytes[k / 8] |= 1 << (k % 8);
            }
        }
        self.offset += usize::from(n_bits);
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_cursor_little_endian() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(cursor.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(cursor.read_u16().unwrap(), 0x0605);
        assert_eq!(cursor.read_u8().unwrap(), 0x07);
        assert!(cursor.read_u8().is_err());
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn byte_cursor_read_bytes() {
        let bytes = b"bgenrest";
        let mut cursor = ByteCursor::new(bytes);
        assert_eq!(cursor.read_bytes(4).unwrap(), b"bgen");
        assert_eq!(cursor.position(), 4);
        assert!(cursor.read_bytes(5).is_err());
        assert_eq!(cursor.remaining(), b"rest");
    }

    #[test]
    fn bits_within_a_byte() {
        // 0b1011_0110: low nibble first.
        let bytes = [0b1011_0110];
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read(4), Some(0b0110));
        assert_eq!(reader.read(4), Some(0b1011));
        assert_eq!(reader.read(1), None);
    }

    #[test]
    fn bits_across_bytes() {
        let bytes = [0xFF, 0x01, 0xAB];
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read(3), Some(0b111));
        // Remaining 5 bits of 0xFF, then the lowest 4 bits of 0x01.
        assert_eq!(reader.read(9), Some(0b11_1111));
        assert_eq!(reader.bit_offset(), 12);
        assert_eq!(reader.skip(4), Some(()));
        assert_eq!(reader.read(8), Some(0xAB));
        assert_eq!(reader.skip(1), None);
    }

    #[test]
    fn full_width_values() {
        let bytes = 0xDEAD_BEEFu32.to_le_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read(32), Some(0xDEAD_BEEF));
    }

    #[test]
    fn random_values_match_packing() {
        let mut rng = fastrand::Rng::with_seed(42);
        for n_bits in 1..=32u8 {
            let values = (0..64).map(|_| rng.u64(..(1u64 << n_bits)) as u32).collect::<Vec<_>>();
            let mut bytes = vec![0u8; (values.len() * usize::from(n_bits) + 7) / 8];
            for (i, value) in values.iter().enumerate() {
                for bit in 0..usize::from(n_bits) {
                    if value >> bit & 1 == 1 {
                        let k = i * usize::from(n_bits) + bit;
                        bytes[k / 8] |= 1 << (k % 8);
                    }
                }
            }
            let mut reader = BitReader::new(&bytes);
            for value in &values {
                assert_eq!(reader.read(n_bits), Some(*value), "n_bits = {n_bits}");
            }
        }
    }

    #[test]
    fn writer_matches_reader() {
        let mut writer = BitWriter::new();
        let values = [(5u32, 3u8), (0, 1), (1023, 10), (0xDEAD_BEEF, 32), (1, 1)];
        for (value, n_bits) in values {
            writer.write(value, n_bits);
        }
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), (3 + 1 + 10 + 32 + 1 + 7) / 8);

        let mut reader = BitReader::new(&bytes);
        for (value, n_bits) in values {
            assert_eq!(reader.read(n_bits), Some(value));
        }
    }
}
