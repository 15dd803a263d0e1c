use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Failed to open BGEN file")]
    Open(#[source] std::io::Error),

    #[error("Failed to memory-map BGEN file")]
    Mmap(#[source] std::io::Error),

    #[error("Variant index {index} is out of range ({len} variants)")]
    VariantOutOfRange{index: usize, len: usize},

    #[error("Data block of variant '{variant}' ([{offset}, {offset}+{length}]) lies beyond the end of the file ({file_length} bytes)")]
    OutOfBounds{variant: String, offset: u64, length: u64, file_length: u64},
}
