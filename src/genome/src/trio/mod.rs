use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufRead, BufReader},
    path::Path
};

use ahash::{AHashMap, AHashSet};
use log::{debug, info};

mod error;
pub use error::TrioError;

/// Placeholder for unknown individuals within a trio file.
pub const MISSING_ID: &str = "NA";

/// Child -> (mother, father) relationships, as read from a tab-separated trio file.
#[derive(Debug, Clone, Default)]
pub struct TrioMap {
    children  : Vec<String>,
    mothers   : AHashMap<String, String>,
    fathers   : AHashMap<String, String>,
    sample_ids: AHashSet<String>,
}

impl TrioMap {
    /// # Arguments:
    /// - `trios`: iterator of `(child, mother, father)`. Missing parents are `None`.
    pub fn new<I, S>(trios: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<S>, Option<S>)>,
        S: Into<String>,
    {
        let mut children = BTreeSet::new();
        let mut mothers  = AHashMap::new();
        let mut fathers  = AHashMap::new();
        for (child, mother, father) in trios {
            let child: String = child.into();
            if let Some(mother) = mother {
                mothers.insert(child.clone(), mother.into());
            }
            if let Some(father) = father {
                fathers.insert(child.clone(), father.into());
            }
            children.insert(child);
        }

        let sample_ids = children.iter()
            .chain(mothers.values())
            .chain(fathers.values())
            .cloned()
            .collect();
        Self{children: children.into_iter().collect(), mothers, fathers, sample_ids}
    }

    /// Read a trio file.
    ///
    /// # Expected file format:
    /// - Header line, followed by one line per child.
    /// - Fields         : `<CHILD>` `<MOTHER>` `<FATHER>`
    /// - Field-separator: `'\t'`
    /// - Unknown individuals are written as `NA`. Lines with an `NA` child are skipped.
    pub fn from_file(path: &Path) -> Result<Self, TrioError> {
        info!("Parsing trio file: {}", path.display());
        let file = File::open(path).map_err(TrioError::Open)?;
        let trios = Self::from_reader(BufReader::new(file))?;
        info!("Found {} children and {} distinct trio members", trios.children.len(), trios.sample_ids.len());
        Ok(trios)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, TrioError> {
        let mut lines = reader.lines().enumerate();

        // ---- Validate header
        let (_, header) = lines.next().ok_or(TrioError::MissingHeader)?;
        let header = header.map_err(|e| TrioError::ReadLine(1, e))?;
        let found = header.split('\t').count();
        if found != 3 {
            return Err(TrioError::ColumnCount{line: 1, found})
        }

        let mut trios = Vec::new();
        for (idx, line) in lines {
            let line_number = idx + 1;
            let line = line.map_err(|e| TrioError::ReadLine(line_number, e))?;
            if line.is_empty() {
                continue
            }
            let fields = line.split('\t').collect::<Vec<&str>>();
            let [child, mother, father] = fields[..] else {
                return Err(TrioError::ColumnCount{line: line_number, found: fields.len()})
            };
            if child == MISSING_ID {
                debug!("Skipping trio with unknown child at line {line_number}");
                continue
            }
            let known = |id: &str| (id != MISSING_ID).then(|| id.to_string());
            trios.push((child.to_string(), known(mother), known(father)));
        }
        Ok(Self::new(trios))
    }

    /// Sorted child identifiers.
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }

    #[must_use]
    pub fn mother(&self, child: &str) -> Option<&str> {
        self.mothers.get(child).map(String::as_str)
    }

    #[must_use]
    pub fn father(&self, child: &str) -> Option<&str> {
        self.fathers.get(child).map(String::as_str)
    }

    /// Whether `sample` is a child, mother or father of any trio.
    #[must_use]
    pub fn contains(&self, sample: &str) -> bool {
        self.sample_ids.contains(sample)
    }

    #[must_use]
    pub fn sample_ids(&self) -> &AHashSet<String> {
        &self.sample_ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve every trio member to its column within a genotype file.
    ///
    /// Members absent from `sample_ids` resolve to `None`, and are thus handled as missing.
    #[must_use]
    pub fn resolve(&self, sample_ids: &[String]) -> TrioSamples {
        let index = sample_ids.iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect::<AHashMap<&str, usize>>();

        let trios = self.children.iter().map(|child| TrioIndices {
            child : index.get(child.as_str()).copied(),
            mother: self.mother(child).and_then(|id| index.get(id).copied()),
            father: self.father(child).and_then(|id| index.get(id).copied()),
        }).collect::<Vec<_>>();

        let members = sample_ids.iter().map(|id| self.contains(id)).collect::<Vec<bool>>();
        let absent = self.sample_ids.iter().filter(|id| !index.contains_key(id.as_str())).count();
        if absent > 0 {
            debug!("{absent} trio member(s) are absent from the genotype file and will be handled as missing");
        }
        TrioSamples{trios, members}
    }
}

/// Column indices of a single trio within a genotype file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrioIndices {
    pub child : Option<usize>,
    pub mother: Option<usize>,
    pub father: Option<usize>,
}

/// Trios resolved against the sample ordering of a genotype file.
#[derive(Debug, Clone, Default)]
pub struct TrioSamples {
    trios  : Vec<TrioIndices>,
    members: Vec<bool>,
}

impl TrioSamples {
    #[must_use]
    pub fn new(trios: Vec<TrioIndices>, n_samples: usize) -> Self {
        let mut members = vec![false; n_samples];
        for idx in trios.iter().flat_map(|t| [t.child, t.mother, t.father]).flatten() {
            if let Some(member) = members.get_mut(idx) {
                *member = true;
            }
        }
        Self{trios, members}
    }

    /// Trios, in the sorted order of their child identifiers.
    #[must_use]
    pub fn trios(&self) -> &[TrioIndices] {
        &self.trios
    }

    /// Whether the sample at column `idx` belongs to any trio.
    #[must_use]
    pub fn is_member(&self, idx: usize) -> bool {
        self.members.get(idx).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trios.is_empty()
    }
}
