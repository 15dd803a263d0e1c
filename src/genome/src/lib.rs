pub mod contig;
pub use contig::Contig;

pub mod inheritance;
pub use inheritance::{InheritanceModel, ContigInheritance, Origin};

pub mod trio;
pub use trio::{TrioMap, TrioSamples, TrioIndices};
