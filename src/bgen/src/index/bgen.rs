use std::{fs::File, io::{self, BufReader, Read, Seek, SeekFrom}, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, info};

use crate::{Compression, VariantInformation};
use super::{IndexError, VariantIndex, MAX_PREALLOCATED_VARIANTS};

const MIN_HEADER_LENGTH: u32 = 20;
const COMPRESSION_MASK: u32 = 0b11;
const LAYOUT_SHIFT: u32 = 2;
const LAYOUT_MASK: u32 = 0b1111;
const SAMPLE_IDS_SHIFT: u32 = 31;
const LOG_INTERVAL: usize = 100_000;

/// Flags of a BGEN header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgenFlags {
    pub compression: Compression,
    pub layout     : u32,
    pub sample_ids : bool,
}

impl BgenFlags {
    /// Parse the header flags, accepting only layout 2.
    pub fn from_u32(flags: u32) -> Result<Self, IndexError> {
        let compression_flag = (flags & COMPRESSION_MASK) as u8;
        let compression = Compression::try_from(compression_flag).map_err(IndexError::Compression)?;
        let layout = (flags >> LAYOUT_SHIFT) & LAYOUT_MASK;
        if layout != 2 {
            return Err(IndexError::Layout(layout))
        }
        let sample_ids = (flags >> SAMPLE_IDS_SHIFT) & 1 == 1;
        Ok(Self{compression, layout, sample_ids})
    }

    #[must_use]
    pub fn to_u32(self) -> u32 {
        u32::from(self.compression.as_u8())
            | (self.layout & LAYOUT_MASK) << LAYOUT_SHIFT
            | u32::from(self.sample_ids) << SAMPLE_IDS_SHIFT
    }
}

fn read_error(field: &'static str) -> impl Fn(io::Error) -> IndexError {
    move |source| IndexError::Read{field, source}
}

fn header_error(field: &'static str, expected: impl ToString, observed: impl ToString) -> IndexError {
    IndexError::Header{field, expected: expected.to_string(), observed: observed.to_string()}
}

fn read_string<R: Read>(reader: &mut R, length: usize, field: &'static str) -> Result<String, IndexError> {
    let mut bytes = vec![0; length];
    reader.read_exact(&mut bytes).map_err(read_error(field))?;
    String::from_utf8(bytes).map_err(|e| header_error(field, "valid UTF-8", e))
}

fn read_u16_string<R: Read>(reader: &mut R, field: &'static str) -> Result<String, IndexError> {
    let length = reader.read_u16::<LittleEndian>().map_err(read_error(field))?;
    read_string(reader, usize::from(length), field)
}

impl VariantIndex {
    /// Scan the header, sample block and variant identifying data of a BGEN v1.2 file.
    ///
    /// Data blocks are skipped, only their offset and length are recorded.
    pub fn from_bgen(path: &Path) -> Result<Self, IndexError> {
        info!("Indexing {}", path.display());
        let file = File::open(path).map_err(|source| IndexError::Open{path: path.to_path_buf(), source})?;
        let file_length = file.metadata().map_err(read_error("file metadata"))?.len();
        let mut reader = BufReader::new(file);

        // ---- Header block
        let offset = reader.read_u32::<LittleEndian>().map_err(read_error("offset"))?;
        let header_length = reader.read_u32::<LittleEndian>().map_err(read_error("header length"))?;
        if header_length > offset {
            return Err(header_error("header length", format!("at most the offset ({offset})"), header_length))
        }
        if header_length < MIN_HEADER_LENGTH {
            return Err(header_error("header length", format!("at least {MIN_HEADER_LENGTH}"), header_length))
        }

        let n_variants = reader.read_u32::<LittleEndian>().map_err(read_error("variant count"))?;
        if n_variants == 0 {
            return Err(header_error("variant count", "at least one variant", n_variants))
        }
        let n_samples = reader.read_u32::<LittleEndian>().map_err(read_error("sample count"))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(read_error("magic number"))?;
        if &magic != b"bgen" && magic != [0; 4] {
            return Err(header_error("magic number", "'bgen' or four zero bytes", format!("{magic:?}")))
        }

        reader.seek_relative(i64::from(header_length - MIN_HEADER_LENGTH)).map_err(read_error("free data area"))?;
        let flags = BgenFlags::from_u32(reader.read_u32::<LittleEndian>().map_err(read_error("flags"))?)?;
        if !flags.sample_ids {
            return Err(IndexError::MissingSampleIds)
        }

        // ---- Sample identifier block
        let sample_block_length = reader.read_u32::<LittleEndian>().map_err(read_error("sample block length"))?;
        if u64::from(sample_block_length) + u64::from(header_length) > u64::from(offset) {
            return Err(header_error(
                "sample block length",
                format!("at most offset - header length ({})", offset - header_length),
                sample_block_length
            ))
        }
        let n_sample_ids = reader.read_u32::<LittleEndian>().map_err(read_error("sample count"))?;
        if n_sample_ids != n_samples {
            return Err(header_error("sample block count", n_samples, n_sample_ids))
        }
        let samples = (0..n_samples)
            .map(|_| read_u16_string(&mut reader, "sample identifier"))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("{} declares {n_variants} variants and {n_samples} samples, compressed with {}", path.display(), flags.compression);

        // ---- Variant identifying data
        reader.seek(SeekFrom::Start(u64::from(offset) + 4)).map_err(read_error("first variant"))?;
        let capacity = (n_variants as usize).min(MAX_PREALLOCATED_VARIANTS);
        let (mut variants, mut offsets, mut lengths) = (Vec::with_capacity(capacity), Vec::with_capacity(capacity), Vec::with_capacity(capacity));
        for i in 0..n_variants as usize {
            let id      = read_u16_string(&mut reader, "variant identifier")?;
            let rsid    = read_u16_string(&mut reader, "rsid")?;
            let contig  = read_u16_string(&mut reader, "contig")?;
            let position = reader.read_u32::<LittleEndian>().map_err(read_error("position"))?;
            let n_alleles = reader.read_u16::<LittleEndian>().map_err(read_error("allele count"))?;
            let alleles = (0..n_alleles).map(|_| {
                let length = reader.read_u32::<LittleEndian>().map_err(read_error("allele length"))?;
                read_string(&mut reader, length as usize, "allele")
            }).collect::<Result<Vec<_>, _>>()?;

            let block_length = reader.read_u32::<LittleEndian>().map_err(read_error("data block length"))?;
            let block_offset = reader.stream_position().map_err(read_error("data block"))?;
            if block_offset + u64::from(block_length) > file_length {
                return Err(header_error("data block end", format!("at most the file length ({file_length})"), block_offset + u64::from(block_length)))
            }
            reader.seek_relative(i64::from(block_length)).map_err(read_error("data block"))?;

            variants.push(VariantInformation::new(id, rsid, contig, position, alleles));
            offsets.push(block_offset);
            lengths.push(u64::from(block_length));

            if (i + 1) % LOG_INTERVAL == 0 {
                debug!("{} of {n_variants} variants indexed", i + 1);
            }
        }

        Self::new(variants, offsets, lengths, samples, flags.compression)
    }
}
