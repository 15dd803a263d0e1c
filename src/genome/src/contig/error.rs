use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid contig name '{0}': contig names must be non-empty and contain no whitespace")]
pub struct ContigError(pub String);
