use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to open '{}'", .path.display())]
    Open{path: PathBuf, #[source] source: io::Error},

    #[error("Failed to read the {field} of the BGEN file")]
    Read{field: &'static str, #[source] source: io::Error},

    #[error("Invalid BGEN {field}: expected {expected}, observed {observed}")]
    Header{field: &'static str, expected: String, observed: String},

    #[error("Invalid compression flag: {0}. Expected 0 (none), 1 (zlib) or 2 (zstd)")]
    Compression(u8),

    #[error("Unsupported BGEN layout: {0}. Only layout 2 is supported")]
    Layout(u32),

    #[error("BGEN file does not carry sample identifiers")]
    MissingSampleIds,

    #[error("Invalid variant index header. Expected '{expected}', found '{found}'")]
    InvalidHeader{expected: &'static str, found: String},

    #[error("Missing '{0}' section in variant index")]
    MissingSection(&'static str),

    #[error("Failed to parse {field} '{value}' at line {line} of the variant index")]
    ParseField{line: usize, field: &'static str, value: String},

    #[error("Expected {expected} columns at line {line} of the variant index, found {found}")]
    ColumnCount{line: usize, expected: usize, found: usize},

    #[error("Variant index declares {expected} variants, found {found}")]
    VariantCount{expected: usize, found: usize},

    #[error("Mismatched variant index: {variants} variants, {offsets} block offsets and {lengths} block lengths")]
    LengthMismatch{variants: usize, offsets: usize, lengths: usize},

    #[error("Failed to read variant index")]
    ReadIndex(#[source] io::Error),

    #[error("Failed to write variant index")]
    WriteIndex(#[source] io::Error),
}
