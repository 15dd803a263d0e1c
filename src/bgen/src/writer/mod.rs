use std::{fs::File, io::{BufWriter, Seek, SeekFrom, Write}, path::{Path, PathBuf}};

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, info};

use crate::{bits::BitWriter, index::BgenFlags, Compression, VariantIndex, VariantInformation};

mod error;
pub use error::WriterError;

/// Identifier stored within the free-data area of the header block.
const FREE_DATA: &[u8; 13] = b"triogen-rs v1";
const HEADER_LENGTH: u32 = 20 + FREE_DATA.len() as u32;
const N_VARIANTS_OFFSET: u64 = 8;
const MAX_PLOIDY: u8 = 63;

/// Haplotype probabilities of one sample at one variant.
///
/// `probabilities` lists `(n_alleles - 1)` values per haplotype, haplotype-major. The last allele is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleProbabilities {
    pub missing      : bool,
    pub ploidy       : u8,
    pub probabilities: Vec<f64>,
}

impl SampleProbabilities {
    #[must_use]
    pub fn new(ploidy: u8, probabilities: Vec<f64>) -> Self {
        Self{missing: false, ploidy, probabilities}
    }

    /// Hard-called phased haplotypes: `haplotypes[z]` is the allele carried by haplotype `z`.
    #[must_use]
    pub fn phased(haplotypes: &[usize], n_alleles: usize) -> Self {
        let probabilities = haplotypes.iter()
            .flat_map(|carried| (0..n_alleles.saturating_sub(1)).map(move |allele| if allele == *carried { 1.0 } else { 0.0 }))
            .collect();
        Self::new(haplotypes.len() as u8, probabilities)
    }

    /// Flag the sample as missing. Its probabilities are still encoded.
    #[must_use]
    pub fn with_missing(mut self, missing: bool) -> Self {
        self.missing = missing;
        self
    }
}

/// Encode the uncompressed layout-2 payload of a phased variant.
pub fn encode_payload(samples: &[SampleProbabilities], n_alleles: u16, n_bits: u8) -> Result<Vec<u8>, WriterError> {
    if !(1..=32).contains(&n_bits) {
        return Err(WriterError::InvalidBits(n_bits))
    }

    let mut payload = Vec::new();
    payload.write_u32::<LittleEndian>(samples.len() as u32)?;
    payload.write_u16::<LittleEndian>(n_alleles)?;
    let min_ploidy = samples.iter().map(|s| s.ploidy).min().unwrap_or(0);
    let max_ploidy = samples.iter().map(|s| s.ploidy).max().unwrap_or(0);
    payload.write_u8(min_ploidy)?;
    if n_alleles <= 1 {
        return Ok(payload)
    }
    payload.write_u8(max_ploidy)?;

    let n_stored_alleles = usize::from(n_alleles) - 1;
    for (i, sample) in samples.iter().enumerate() {
        if sample.ploidy > MAX_PLOIDY {
            return Err(WriterError::InvalidPloidy{sample: i, ploidy: sample.ploidy})
        }
        let expected = usize::from(sample.ploidy) * n_stored_alleles;
        if sample.probabilities.len() != expected {
            return Err(WriterError::ProbabilityCount{sample: i, expected, found: sample.probabilities.len()})
        }
        payload.write_u8(sample.ploidy | if sample.missing { 0b1000_0000 } else { 0 })?;
    }
    payload.write_u8(1)?; // phased
    payload.write_u8(n_bits)?;

    let denominator = ((1u64 << n_bits) - 1) as f64;
    let mut bits = BitWriter::new();
    for p in samples.iter().flat_map(|sample| &sample.probabilities) {
        bits.write((p.clamp(0.0, 1.0) * denominator).round() as u32, n_bits);
    }
    payload.extend(bits.into_bytes());
    Ok(payload)
}

/// Compress a payload into a variant data block: `[u32 uncompressed length][compressed payload]`.
pub fn wrap_payload(payload: &[u8], compression: Compression) -> Result<Vec<u8>, WriterError> {
    let compressed = compression.compress(payload)?;
    let mut block = Vec::with_capacity(compressed.len() + 4);
    block.write_u32::<LittleEndian>(payload.len() as u32)?;
    block.extend(compressed);
    Ok(block)
}

/// Encode and compress the data block of a phased variant. Probabilities are rounded to the nearest
/// multiple of `1 / (2^n_bits - 1)`.
pub fn encode_block(samples: &[SampleProbabilities], n_alleles: u16, n_bits: u8, compression: Compression) -> Result<Vec<u8>, WriterError> {
    wrap_payload(&encode_payload(samples, n_alleles, n_bits)?, compression)
}

/// Writes phased BGEN v1.2 (layout 2) files, with sample identifiers.
///
/// The variant count of the header is patched once [`BgenWriter::finish`] is called.
pub struct BgenWriter {
    writer     : BufWriter<File>,
    path       : PathBuf,
    samples    : Vec<String>,
    compression: Compression,
    n_bits     : u8,
    position   : u64,
    variants   : Vec<VariantInformation>,
    offsets    : Vec<u64>,
    lengths    : Vec<u64>,
}

impl BgenWriter {
    pub fn create(path: &Path, samples: Vec<String>, compression: Compression, n_bits: u8) -> Result<Self, WriterError> {
        if !(1..=32).contains(&n_bits) {
            return Err(WriterError::InvalidBits(n_bits))
        }
        let file = File::create(path).map_err(WriterError::Create)?;
        let mut writer = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            samples,
            compression,
            n_bits,
            position: 0,
            variants: Vec::new(),
            offsets: Vec::new(),
            lengths: Vec::new(),
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_header(&mut self) -> Result<(), WriterError> {
        let sample_block_length = 8 + self.samples.iter().map(|id| 2 + id.len() as u32).sum::<u32>();
        let flags = BgenFlags{compression: self.compression, layout: 2, sample_ids: true};

        let mut header = Vec::new();
        header.write_u32::<LittleEndian>(HEADER_LENGTH + sample_block_length)?;
        header.write_u32::<LittleEndian>(HEADER_LENGTH)?;
        header.write_u32::<LittleEndian>(0)?; // variant count, patched in finish()
        header.write_u32::<LittleEndian>(self.samples.len() as u32)?;
        header.write_all(b"bgen")?;
        header.write_all(FREE_DATA)?;
        header.write_u32::<LittleEndian>(flags.to_u32())?;

        header.write_u32::<LittleEndian>(sample_block_length)?;
        header.write_u32::<LittleEndian>(self.samples.len() as u32)?;
        for id in &self.samples {
            write_u16_string(&mut header, "Sample id", id)?;
        }
        self.write_all(&header)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        self.writer.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Append a variant. `samples` must follow the sample ordering given at creation.
    pub fn write_variant(&mut self, info: VariantInformation, samples: &[SampleProbabilities]) -> Result<(), WriterError> {
        if samples.len() != self.samples.len() {
            return Err(WriterError::SampleCount{variant: info.id, expected: self.samples.len(), found: samples.len()})
        }
        let block = encode_block(samples, info.n_alleles() as u16, self.n_bits, self.compression)?;

        let mut id_data = Vec::new();
        write_u16_string(&mut id_data, "Variant id", &info.id)?;
        write_u16_string(&mut id_data, "rsid", &info.rsid)?;
        write_u16_string(&mut id_data, "Contig", info.contig.as_str())?;
        id_data.write_u32::<LittleEndian>(info.position)?;
        id_data.write_u16::<LittleEndian>(info.n_alleles() as u16)?;
        for allele in &info.alleles {
            id_data.write_u32::<LittleEndian>(allele.len() as u32)?;
            id_data.write_all(allele.as_bytes())?;
        }
        id_data.write_u32::<LittleEndian>(block.len() as u32)?;
        self.write_all(&id_data)?;

        self.offsets.push(self.position);
        self.lengths.push(block.len() as u64);
        self.write_all(&block)?;
        self.variants.push(info);
        Ok(())
    }

    /// Patch the variant count, flush the file, and return the matching index.
    pub fn finish(mut self) -> Result<VariantIndex, WriterError> {
        self.writer.seek(SeekFrom::Start(N_VARIANTS_OFFSET))?;
        self.writer.write_u32::<LittleEndian>(self.variants.len() as u32)?;
        self.writer.flush()?;
        info!("Wrote {} variants for {} samples to {}", self.variants.len(), self.samples.len(), self.path.display());
        debug!("Compression: {}, bits per probability: {}", self.compression, self.n_bits);

        Ok(VariantIndex::new(self.variants, self.offsets, self.lengths, self.samples, self.compression)?)
    }
}

fn write_u16_string<W: Write>(writer: &mut W, field: &'static str, value: &str) -> Result<(), WriterError> {
    let length = u16::try_from(value.len()).map_err(|_| WriterError::FieldTooLong{field, value: value.to_string()})?;
    writer.write_u16::<LittleEndian>(length)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ByteCursor;

    #[test]
    fn phased_hard_calls() {
        let sample = SampleProbabilities::phased(&[0, 2], 3);
        assert_eq!(sample.ploidy, 2);
        assert_eq!(sample.probabilities, vec![1.0, 0.0, 0.0, 0.0]);
        assert!(!sample.missing);
        assert!(sample.with_missing(true).missing);
    }

    #[test]
    fn payload_layout() {
        let samples = [SampleProbabilities::phased(&[1, 0], 2), SampleProbabilities::phased(&[1], 2).with_missing(true)];
        let payload = encode_payload(&samples, 2, 8).unwrap();
        let mut cursor = ByteCursor::new(&payload);
        assert_eq!(cursor.read_u32().unwrap(), 2);
        assert_eq!(cursor.read_u16().unwrap(), 2);
        assert_eq!(cursor.read_u8().unwrap(), 1); // min ploidy
        assert_eq!(cursor.read_u8().unwrap(), 2); // max ploidy
        assert_eq!(cursor.read_u8().unwrap(), 2);
        assert_eq!(cursor.read_u8().unwrap(), 0b1000_0001);
        assert_eq!(cursor.read_u8().unwrap(), 1);
        assert_eq!(cursor.read_u8().unwrap(), 8);
        assert_eq!(cursor.remaining(), &[0, 255, 0]);
    }

    #[test]
    fn invalid_samples() {
        let samples = [SampleProbabilities::new(2, vec![0.5])];
        assert!(matches!(encode_payload(&samples, 2, 8), Err(WriterError::ProbabilityCount{sample: 0, expected: 2, found: 1})));
        assert!(matches!(encode_payload(&samples, 2, 0), Err(WriterError::InvalidBits(0))));
        let samples = [SampleProbabilities::new(64, vec![0.0; 64])];
        assert!(matches!(encode_payload(&samples, 2, 8), Err(WriterError::InvalidPloidy{sample: 0, ploidy: 64})));
    }

    #[test]
    fn block_carries_uncompressed_length() {
        let samples = [SampleProbabilities::phased(&[0, 1], 2)];
        let payload = encode_payload(&samples, 2, 16).unwrap();
        for compression in [Compression::None, Compression::Zlib, Compression::Zstd] {
            let block = encode_block(&samples, 2, 16, compression).unwrap();
            let mut cursor = ByteCursor::new(&block);
            assert_eq!(cursor.read_u32().unwrap() as usize, payload.len());
            assert_eq!(compression.decompress(cursor.remaining(), payload.len()).unwrap(), payload);
        }
    }
}
