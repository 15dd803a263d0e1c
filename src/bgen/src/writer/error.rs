use thiserror::Error;

use crate::IndexError;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Failed to create BGEN file")]
    Create(#[source] std::io::Error),

    #[error("Failed to write BGEN file")]
    Write(#[from] std::io::Error),

    #[error("Sample {sample} lists {found} probabilities. Expected (n_alleles - 1) x ploidy = {expected}")]
    ProbabilityCount{sample: usize, expected: usize, found: usize},

    #[error("Invalid number of bits per probability: {0}. Expected a value within [1, 32]")]
    InvalidBits(u8),

    #[error("Invalid ploidy for sample {sample}: {ploidy}. Expected a value within [0, 63]")]
    InvalidPloidy{sample: usize, ploidy: u8},

    #[error("{field} '{value}' is too long to be encoded")]
    FieldTooLong{field: &'static str, value: String},

    #[error("Variant '{variant}' holds {found} samples, while the file declares {expected}")]
    SampleCount{variant: String, expected: usize, found: usize},

    #[error(transparent)]
    Index(#[from] IndexError),
}
