use std::sync::Arc;

use genome::{InheritanceModel, TrioSamples};
use log::trace;

use crate::{bits::{BitReader, ByteCursor}, Compression, VariantIndex, VariantInformation};

mod error;
pub use error::{DecodeError, ErrorKind};

mod decoded;
pub use decoded::{DecodedVariant, SampleHaplotypes};

/// Largest data block accepted by the decoder.
pub const MAX_BLOCK_LENGTH: u64 = i32::MAX as u64;

const MAX_PLOIDY: u8 = 63;
const MISSING_MASK: u8 = 0b1000_0000;
const PLOIDY_MASK: u8 = 0b0111_1111;
const MAX_BITS: u8 = 32;
const PROBABILITY_TOLERANCE: f64 = 0.1;

/// Decodes layout-2 phased BGEN data blocks for a fixed set of trios.
///
/// Shared across decoding threads: decoding only reads `self`.
#[derive(Debug, Clone)]
pub struct BlockDecoder {
    n_samples  : usize,
    compression: Compression,
    trios      : Arc<TrioSamples>,
    inheritance: Arc<InheritanceModel>,
}

impl BlockDecoder {
    #[must_use]
    pub fn new(n_samples: usize, compression: Compression, trios: Arc<TrioSamples>, inheritance: Arc<InheritanceModel>) -> Self {
        Self{n_samples, compression, trios, inheritance}
    }

    #[must_use]
    pub fn from_index(index: &VariantIndex, trios: Arc<TrioSamples>, inheritance: Arc<InheritanceModel>) -> Self {
        Self::new(index.samples().len(), index.compression(), trios, inheritance)
    }

    #[must_use]
    pub fn trios(&self) -> &Arc<TrioSamples> {
        &self.trios
    }

    /// Decode the raw data block of `info`: `[u32 uncompressed length][compressed payload]`.
    pub fn decode(&self, info: Arc<VariantInformation>, block: &[u8]) -> Result<DecodedVariant, DecodeError> {
        let payload = self.decompress(&info, block)?;
        self.parse(info, &payload)
    }

    fn decompress(&self, info: &VariantInformation, block: &[u8]) -> Result<Vec<u8>, DecodeError> {
        if block.len() as u64 > MAX_BLOCK_LENGTH {
            return Err(DecodeError::Capacity{variant_id: info.id.clone(), expected: MAX_BLOCK_LENGTH, observed: block.len() as u64})
        }

        let mut cursor = ByteCursor::new(block);
        let expected = cursor.read_u32().map_err(|_| DecodeError::truncated(info, "uncompressed length"))?;
        if expected == 0 || u64::from(expected) > MAX_BLOCK_LENGTH {
            return Err(DecodeError::format(info, "uncompressed length", format!("(0, {MAX_BLOCK_LENGTH}]"), expected))
        }

        let payload = self.compression.decompress(cursor.remaining(), expected as usize)
            .map_err(|source| DecodeError::Decompression{variant_id: info.id.clone(), codec: self.compression, source})?;
        if payload.len() != expected as usize {
            return Err(DecodeError::format(info, "decompressed length", expected, payload.len()))
        }
        Ok(payload)
    }

    fn parse(&self, info: Arc<VariantInformation>, payload: &[u8]) -> Result<DecodedVariant, DecodeError> {
        let mut cursor = ByteCursor::new(payload);

        // ---- Header
        let n_samples = cursor.read_u32().map_err(|_| DecodeError::truncated(&info, "sample count"))?;
        if n_samples as usize != self.n_samples {
            return Err(DecodeError::consistency(&info, "sample count", self.n_samples as u64, u64::from(n_samples)))
        }

        let n_alleles = cursor.read_u16().map_err(|_| DecodeError::truncated(&info, "allele count"))?;
        if usize::from(n_alleles) != info.n_alleles() {
            return Err(DecodeError::consistency(&info, "allele count", info.n_alleles() as u64, u64::from(n_alleles)))
        }

        let min_ploidy = cursor.read_u8().map_err(|_| DecodeError::truncated(&info, "minimum ploidy"))?;
        if min_ploidy > MAX_PLOIDY {
            return Err(DecodeError::format(&info, "minimum ploidy", format!("[0, {MAX_PLOIDY}]"), min_ploidy))
        }

        let n_samples = n_samples as usize;
        if n_alleles <= 1 {
            trace!("Variant {} carries a single allele. Skipping sample data.", info.id);
            return Ok(self.empty(info, n_samples))
        }
        if min_ploidy > 2 {
            return Err(DecodeError::format(&info, "minimum ploidy of a multi-allelic layout", "at most 2", min_ploidy))
        }

        let max_ploidy = cursor.read_u8().map_err(|_| DecodeError::truncated(&info, "maximum ploidy"))?;
        if max_ploidy > MAX_PLOIDY {
            return Err(DecodeError::format(&info, "maximum ploidy", format!("[0, {MAX_PLOIDY}]"), max_ploidy))
        }

        // ---- Ploidy and missingness
        let sample_bytes = cursor.read_bytes(n_samples).map_err(|_| DecodeError::truncated(&info, "sample ploidy"))?;
        let mut ploidy = Vec::with_capacity(n_samples);
        let mut missing = Vec::with_capacity(n_samples);
        for byte in sample_bytes {
            let sample_ploidy = byte & PLOIDY_MASK;
            if sample_ploidy < min_ploidy || sample_ploidy > max_ploidy {
                return Err(DecodeError::format(&info, "sample ploidy", format!("[{min_ploidy}, {max_ploidy}]"), sample_ploidy))
            }
            ploidy.push(sample_ploidy);
            missing.push(byte & MISSING_MASK != 0);
        }

        let phased = cursor.read_u8().map_err(|_| DecodeError::truncated(&info, "phased flag"))?;
        match phased {
            1 => (),
            0 => return Err(DecodeError::format(&info, "phased genotypes", 1, 0)),
            other => return Err(DecodeError::format(&info, "phased flag", "0 or 1", other)),
        }

        let n_bits = cursor.read_u8().map_err(|_| DecodeError::truncated(&info, "bits per probability"))?;
        if !(1..=MAX_BITS).contains(&n_bits) {
            return Err(DecodeError::format(&info, "bits per probability", format!("[1, {MAX_BITS}]"), n_bits))
        }

        // ---- Probabilities
        let n_stored_alleles = usize::from(n_alleles) - 1;
        let n_values = ploidy.iter().map(|z| usize::from(*z) * n_stored_alleles).sum::<usize>();
        let expected_bytes = (n_values * usize::from(n_bits) + 7) / 8;
        if cursor.remaining().len() < expected_bytes {
            return Err(DecodeError::format(&info, "probability data length", expected_bytes, cursor.remaining().len()))
        }

        let denominator = ((1u64 << n_bits) - 1) as f64;
        let mut bits = BitReader::new(cursor.remaining());
        let mut samples = Vec::with_capacity(n_samples);
        for (i, (z, is_missing)) in ploidy.iter().zip(&missing).enumerate() {
            let n_sample_values = usize::from(*z) * n_stored_alleles;
            if *is_missing && self.trios.is_member(i) {
                bits.skip(n_sample_values * usize::from(n_bits))
                    .ok_or_else(|| DecodeError::truncated(&info, "probability data"))?;
                samples.push(None);
                continue
            }

            let mut probabilities = Vec::with_capacity(n_sample_values);
            for _ in 0..n_sample_values {
                let value = bits.read(n_bits).ok_or_else(|| DecodeError::truncated(&info, "probability data"))?;
                let p = f64::from(value) / denominator;
                if !(-PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE).contains(&p) {
                    return Err(DecodeError::format(&info, "probability", "[-0.1, 1.1]", p))
                }
                probabilities.push(p.clamp(0.0, 1.0));
            }
            samples.push(Some(SampleHaplotypes::new(probabilities, usize::from(n_alleles), *z)));
        }

        self.check_inheritance(&info, &ploidy, &samples)?;
        Ok(DecodedVariant::new(info, self.inheritance.clone(), ploidy, missing, samples, &self.trios))
    }

    /// Every genotyped, non-empty child must have an inheritance mapping for its ploidy.
    fn check_inheritance(&self, info: &VariantInformation, ploidy: &[u8], samples: &[Option<SampleHaplotypes>]) -> Result<(), DecodeError> {
        let configuration = |source| DecodeError::Configuration{variant_id: info.id.clone(), source};
        let rules = self.inheritance.contig(&info.contig).map_err(configuration)?;
        for child in self.trios.trios().iter().filter_map(|trio| trio.child) {
            let (Some(&child_ploidy), Some(Some(_))) = (ploidy.get(child), samples.get(child)) else {
                continue
            };
            if child_ploidy > 0 && rules.origins(child_ploidy).is_none() {
                return Err(configuration(genome::inheritance::InheritanceError::UnknownPloidy{
                    contig: info.contig.to_string(),
                    ploidy: child_ploidy
                }))
            }
        }
        Ok(())
    }

    fn empty(&self, info: Arc<VariantInformation>, n_samples: usize) -> DecodedVariant {
        DecodedVariant::new(info, self.inheritance.clone(), vec![0; n_samples], vec![false; n_samples], vec![None; n_samples], &self.trios)
    }
}
