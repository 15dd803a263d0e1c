use std::{fmt::{self, Display, Formatter}, io::{self, Read, Write}};

use flate2::{read::ZlibDecoder, write::ZlibEncoder};

const ZSTD_LEVEL: i32 = 3;

/// Compression codec of the variant data blocks, as declared in bits 0-1 of the BGEN header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Zlib,
    Zstd,
}

impl Compression {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Zlib => 1,
            Self::Zstd => 2,
        }
    }

    /// Decompress `input`, reading at most `expected + 1` bytes.
    ///
    /// The caller is responsible for checking the length of the output against `expected`.
    pub fn decompress(self, input: &[u8], expected: usize) -> io::Result<Vec<u8>> {
        let limit = expected as u64 + 1;
        let mut output = Vec::with_capacity(expected);
        match self {
            Self::None => { output.extend_from_slice(input); },
            Self::Zlib => { ZlibDecoder::new(input).take(limit).read_to_end(&mut output)?; },
            Self::Zstd => { zstd::stream::read::Decoder::new(input)?.take(limit).read_to_end(&mut output)?; },
        }
        Ok(output)
    }

    pub fn compress(self, input: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::None => Ok(input.to_vec()),
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(input)?;
                encoder.finish()
            },
            Self::Zstd => {
                let mut output = Vec::new();
                zstd::stream::copy_encode(input, &mut output, ZSTD_LEVEL)?;
                Ok(output)
            },
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = u8;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Zstd),
            other => Err(other),
        }
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Zstd => "zstd",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Vec<u8> {
        (0..4096u32).map(|i| (i % 7) as u8).collect()
    }

    #[test]
    fn codec_ids() {
        for codec in [Compression::None, Compression::Zlib, Compression::Zstd] {
            assert_eq!(Compression::try_from(codec.as_u8()), Ok(codec));
        }
        assert_eq!(Compression::try_from(3), Err(3));
    }

    #[test]
    fn compressed_payloads_decompress() {
        let payload = payload();
        for codec in [Compression::None, Compression::Zlib, Compression::Zstd] {
            let compressed = codec.compress(&payload).expect("compress");
            let decompressed = codec.decompress(&compressed, payload.len()).expect("decompress");
            assert_eq!(decompressed, payload, "{codec}");
        }
    }

    #[test]
    fn decompression_is_bounded() {
        let payload = payload();
        let compressed = Compression::Zlib.compress(&payload).expect("compress");
        let decompressed = Compression::Zlib.decompress(&compressed, 10).expect("decompress");
        assert_eq!(decompressed.len(), 11);
    }

    #[test]
    fn corrupt_zlib_stream() {
        assert!(Compression::Zlib.decompress(&[0x13, 0x37, 0x00, 0x42], 16).is_err());
    }
}
