use std::{borrow::Borrow, fmt::{self, Display, Formatter}, ops::Deref, str::FromStr};

use serde::{Serialize, Deserialize};

mod error;
pub use error::ContigError;

/// Name of a contig, as written in the genotype file (e.g. `"1"`, `"chrX"`, `"24"`).
///
/// Equality and ordering apply to the raw name. Use [`Contig::canonical`] to compare names
/// regardless of a `chr` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contig(String);

impl Contig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Contig name stripped of any leading `chr` prefix.
    #[must_use]
    pub fn canonical(&self) -> &str {
        canonical_name(&self.0)
    }
}

/// Strip a leading `chr` prefix, if any.
#[must_use]
pub fn canonical_name(name: &str) -> &str {
    name.strip_prefix("chr").unwrap_or(name)
}

impl FromStr for Contig {
    type Err = ContigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains(char::is_whitespace) {
            return Err(ContigError(s.to_string()))
        }
        Ok(Self(s.to_string()))
    }
}

impl Display for Contig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Contig {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Contig {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Deref for Contig {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Contig {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Contig {
    fn borrow(&self) -> &str {
        &self.0
    }
}
