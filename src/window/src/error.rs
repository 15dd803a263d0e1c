use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum WindowError {
    #[error("Contig {0} is not buffered")]
    ContigNotBuffered(String),

    #[error("Sliding window start ({start}) out of range ({min} - {max}) for contig {contig}")]
    WindowStartOutOfRange{contig: String, start: u32, min: u32, max: u32},

    #[error("Loading aborted at {contig}:{max}: cannot query positions up to {end}")]
    LoadingAborted{contig: String, end: u32, max: u32},

    #[error("Variant source is not sorted: found {contig}:{position} after {previous}")]
    UnsortedSource{contig: String, position: u32, previous: String},

    #[error("Invalid {name} loading factor ({value}). Loading factors must be greater than or equal to one")]
    InvalidLoadingFactor{name: &'static str, value: f64},

    #[error("Batch size must be a strictly positive integer")]
    InvalidBatchSize,

    #[error("Minor allele frequency threshold must lie within [0, 0.5). Got {0}")]
    InvalidMaf(f64),
}
