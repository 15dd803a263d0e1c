use thiserror::Error;
use crate::FileEntity;

#[derive(Error, Debug)]
pub enum ParserError{
    #[error("{0} {1} does not exist")]
    MissingFileEntity(FileEntity, String),

    #[error("{1} is not a {0}")]
    InvalidFileEntity(FileEntity, String),

    #[error("The provided value must be greater than or equal to {0}")]
    ParseLoadingFactor(f64),

    #[error("The provided value must lie within [{0}, {1})")]
    ParseMaf(f64, f64),

    #[error("--threads must be greater than 0")]
    InsufficientThreads,

    #[error("--start ({start}) must not exceed --end ({end})")]
    InvalidRange{start: u32, end: u32},

    #[error("Failed to generate an output file prefix from {0}")]
    ParseOutputPrefix(String),

    #[error("{0} already exists. Use --overwrite to force.")]
    CannotOverwrite(String)
}
