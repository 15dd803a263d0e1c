use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    fs::File,
    io::Read,
    path::Path,
    str::FromStr
};

use serde::{Serialize, Deserialize};
use log::{debug, info};

use crate::contig::canonical_name;

mod error;
pub use error::InheritanceError;

/// Parental origin of a haplotype slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[serde(alias = "M", alias = "mother")]
    Mother,
    #[serde(alias = "F", alias = "father")]
    Father,
}

impl Origin {
    /// Flip the maternal/paternal labelling.
    #[must_use]
    pub fn swap(self) -> Self {
        match self {
            Self::Mother => Self::Father,
            Self::Father => Self::Mother,
        }
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m" | "mother" => Ok(Self::Mother),
            "f" | "father" => Ok(Self::Father),
            other          => Err(format!("Invalid haplotype origin '{other}'. Expected 'M' or 'F'")),
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mother => "M",
            Self::Father => "F",
        })
    }
}

/// Inheritance rules of a single contig.
///
/// # Fields:
/// - `inheritance`  : ploidy -> ordered origin of each haplotype slot.
/// - `mother_ploidy`: ploidy assumed for a mother whose genotype is missing.
/// - `father_ploidy`: ploidy assumed for a father whose genotype is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContigInheritance {
    pub inheritance  : BTreeMap<u8, Vec<Origin>>,
    pub mother_ploidy: u8,
    pub father_ploidy: u8,
}

impl ContigInheritance {
    #[must_use]
    pub fn new(inheritance: BTreeMap<u8, Vec<Origin>>, mother_ploidy: u8, father_ploidy: u8) -> Self {
        Self{inheritance, mother_ploidy, father_ploidy}
    }

    fn autosome() -> Self {
        Self::new(BTreeMap::from([(2, vec![Origin::Mother, Origin::Father])]), 2, 2)
    }

    fn chr_x() -> Self {
        Self::new(BTreeMap::from([
            (1, vec![Origin::Mother]),
            (2, vec![Origin::Mother, Origin::Father])
        ]), 2, 1)
    }

    fn chr_y() -> Self {
        Self::new(BTreeMap::from([(1, vec![Origin::Father])]), 0, 1)
    }

    /// Ordered origins of the haplotype slots of a sample with the given ploidy.
    #[must_use]
    pub fn origins(&self, ploidy: u8) -> Option<&[Origin]> {
        self.inheritance.get(&ploidy).map(Vec::as_slice)
    }

    #[must_use]
    pub fn default_ploidy(&self, parent: Origin) -> u8 {
        match parent {
            Origin::Mother => self.mother_ploidy,
            Origin::Father => self.father_ploidy,
        }
    }

    fn validate(&self, contig: &str) -> Result<(), InheritanceError> {
        for (ploidy, origins) in &self.inheritance {
            if origins.len() != usize::from(*ploidy) {
                return Err(InheritanceError::OriginCount{contig: contig.to_string(), ploidy: *ploidy, found: origins.len()})
            }
        }
        Ok(())
    }
}

/// Contig name -> inheritance rules.
///
/// Lookups ignore a leading `chr` prefix on both the requested contig and the configured keys.
/// The [`Default`] table describes the human genome: autosomes `1`..`22`, `X`/`23` and `Y`/`24`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InheritanceModel {
    contigs: BTreeMap<String, ContigInheritance>,
}

impl InheritanceModel {
    /// Build a model from a contig -> rules table, checking that every origin list matches its ploidy.
    pub fn new(contigs: BTreeMap<String, ContigInheritance>) -> Result<Self, InheritanceError> {
        let contigs = contigs.into_iter()
            .map(|(name, rules)| (canonical_name(&name).to_string(), rules))
            .collect::<BTreeMap<_, _>>();
        for (name, rules) in &contigs {
            rules.validate(name)?;
        }
        Ok(Self{contigs})
    }

    /// Load a model from a `.yaml` file. Keys are contig names, e.g.:
    /// ```yaml
    /// "X":
    ///   inheritance:
    ///     1: [Mother]
    ///     2: [Mother, Father]
    ///   mother_ploidy: 2
    ///   father_ploidy: 1
    /// ```
    pub fn from_yaml(path: &Path) -> Result<Self, InheritanceError> {
        info!("Loading inheritance model from {}", path.display());
        let file = File::open(path).map_err(InheritanceError::Open)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, InheritanceError> {
        let contigs: BTreeMap<String, ContigInheritance> = serde_yaml::from_reader(reader)
            .map_err(InheritanceError::ParseYaml)?;
        let model = Self::new(contigs)?;
        debug!("Inheritance model covers contigs: {:?}", model.contigs.keys().collect::<Vec<_>>());
        Ok(model)
    }

    /// Inheritance rules of `contig`.
    ///
    /// # Errors
    /// `InheritanceError::UnknownContig` if the model holds no entry for this contig.
    pub fn contig(&self, contig: &str) -> Result<&ContigInheritance, InheritanceError> {
        self.contigs.get(canonical_name(contig))
            .ok_or_else(|| InheritanceError::UnknownContig(contig.to_string()))
    }

    /// Ordered haplotype origins of a sample carrying `ploidy` copies of `contig`.
    pub fn inheritance(&self, contig: &str, ploidy: u8) -> Result<&[Origin], InheritanceError> {
        self.contig(contig)?
            .origins(ploidy)
            .ok_or_else(|| InheritanceError::UnknownPloidy{contig: contig.to_string(), ploidy})
    }

    /// Ploidy assumed for a missing parent on `contig`.
    pub fn default_ploidy(&self, contig: &str, parent: Origin) -> Result<u8, InheritanceError> {
        Ok(self.contig(contig)?.default_ploidy(parent))
    }

    pub fn contigs(&self) -> impl Iterator<Item = (&str, &ContigInheritance)> {
        self.contigs.iter().map(|(name, rules)| (name.as_str(), rules))
    }
}

impl Default for InheritanceModel {
    fn default() -> Self {
        let mut contigs = (1..=22u8)
            .map(|chr| (chr.to_string(), ContigInheritance::autosome()))
            .collect::<BTreeMap<_, _>>();
        for name in ["X", "23"] {
            contigs.insert(name.to_string(), ContigInheritance::chr_x());
        }
        for name in ["Y", "24"] {
            contigs.insert(name.to_string(), ContigInheritance::chr_y());
        }
        Self{contigs}
    }
}
