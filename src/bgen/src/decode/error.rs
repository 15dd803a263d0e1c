use std::fmt::Display;

use genome::inheritance::InheritanceError;
use thiserror::Error;

use crate::{Compression, VariantInformation};

/// Broad class of a [`DecodeError`], used by loaders to decide whether a variant may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Configuration,
    Capacity,
    Consistency,
    Query,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid data block for variant '{variant_id}': {invariant} (expected {expected}, observed {observed})")]
    Format{variant_id: String, invariant: &'static str, expected: String, observed: String},

    #[error("Failed to decompress the data block of variant '{variant_id}' using {codec}")]
    Decompression{variant_id: String, codec: Compression, #[source] source: std::io::Error},

    #[error("Missing inheritance rules for variant '{variant_id}'")]
    Configuration{variant_id: String, #[source] source: InheritanceError},

    #[error("Data block of variant '{variant_id}' spans {observed} bytes, exceeding the maximum block length of {expected} bytes")]
    Capacity{variant_id: String, expected: u64, observed: u64},

    #[error("Variant index and data block of '{variant_id}' disagree on the {invariant} (expected {expected}, observed {observed})")]
    Consistency{variant_id: String, invariant: &'static str, expected: u64, observed: u64},

    #[error("Sample {sample} has no stored haplotypes for variant '{variant_id}'")]
    MissingSample{variant_id: String, sample: usize},

    #[error("Allele index {allele} is out of range for variant '{variant_id}' ({n_alleles} alleles)")]
    AlleleOutOfRange{variant_id: String, allele: usize, n_alleles: usize},
}

impl DecodeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format{..} | Self::Decompression{..}       => ErrorKind::Format,
            Self::Configuration{..}                          => ErrorKind::Configuration,
            Self::Capacity{..}                               => ErrorKind::Capacity,
            Self::Consistency{..}                            => ErrorKind::Consistency,
            Self::MissingSample{..} | Self::AlleleOutOfRange{..} => ErrorKind::Query,
        }
    }

    pub(crate) fn format(info: &VariantInformation, invariant: &'static str, expected: impl Display, observed: impl Display) -> Self {
        Self::Format{variant_id: info.id.clone(), invariant, expected: expected.to_string(), observed: observed.to_string()}
    }

    pub(crate) fn consistency(info: &VariantInformation, invariant: &'static str, expected: u64, observed: u64) -> Self {
        Self::Consistency{variant_id: info.id.clone(), invariant, expected, observed}
    }

    pub(crate) fn truncated(info: &VariantInformation, field: &'static str) -> Self {
        Self::format(info, field, "more bytes", "end of block")
    }
}
