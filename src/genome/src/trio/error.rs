use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrioError {
    #[error("Expected 3 tab-separated columns (child, mother, father), found {found} in line {line}")]
    ColumnCount{line: usize, found: usize},

    #[error("Trio file is empty. Expected a header line with the columns: child, mother, father")]
    MissingHeader,

    #[error("Failed to read line {0} of the trio file")]
    ReadLine(usize, #[source] std::io::Error),

    #[error("Failed to open trio file")]
    Open(#[source] std::io::Error),
}
