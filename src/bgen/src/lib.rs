//! Phased BGEN (v1.2, layout 2) support for trio analyses.
//!
//! - [`VariantIndex`]: catalog of the variants, samples and block offsets of a BGEN file.
//! - [`BlockDecoder`]: turns one compressed variant block into a [`DecodedVariant`], holding haplotype
//!   probabilities, parental allele frequencies and trio haplotype transmission.
//! - [`BgenReader`] / [`BgenVariantSource`]: memory-mapped access to the raw blocks.
//! - [`BgenWriter`]: writes phased BGEN files, along with their index.
//! - [`mendelian`]: Mendelian error prevalence and phase correction.

pub mod variant;
pub use variant::VariantInformation;

pub mod compression;
pub use compression::Compression;

pub mod bits;

pub mod decode;
pub use decode::{BlockDecoder, DecodedVariant, DecodeError, ErrorKind, SampleHaplotypes};

pub mod index;
pub use index::{VariantIndex, IndexError};

pub mod reader;
pub use reader::{BgenReader, BgenVariantSource, MemorySource, MockVariantSource, RawVariant, VariantSource, ReaderError};

pub mod writer;
pub use writer::{BgenWriter, SampleProbabilities, WriterError, encode_block, encode_payload, wrap_payload};

pub mod mendelian;
