use thiserror::Error;

#[derive(Error, Debug)]
pub enum InheritanceError {
    #[error("No inheritance mapping found for contig '{0}'")]
    UnknownContig(String),

    #[error("No inheritance mapping found for ploidy {ploidy} on contig '{contig}'")]
    UnknownPloidy{contig: String, ploidy: u8},

    #[error("Invalid inheritance mapping for contig '{contig}': ploidy {ploidy} lists {found} haplotype origins")]
    OriginCount{contig: String, ploidy: u8, found: usize},

    #[error("Failed to parse inheritance configuration file")]
    ParseYaml(#[source] serde_yaml::Error),

    #[error("Failed to open inheritance configuration file")]
    Open(#[source] std::io::Error),
}
