use std::{path::{Path, PathBuf}, sync::Arc};

use log::info;

use crate::{Compression, VariantInformation};

mod error;
pub use error::IndexError;

mod bgen;
pub use bgen::BgenFlags;

mod text;
pub use text::INDEX_HEADER;

/// Upper bound on the variant capacity preallocated from a declared count.
const MAX_PREALLOCATED_VARIANTS: usize = 1 << 20;

/// Catalog of the variants of a BGEN file.
///
/// Holds the identifying data of each variant, along with the offset and length of its data block,
/// the ordered sample identifiers and the compression codec of the file.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantIndex {
    variants   : Vec<Arc<VariantInformation>>,
    offsets    : Vec<u64>,
    lengths    : Vec<u64>,
    samples    : Vec<String>,
    compression: Compression,
}

impl VariantIndex {
    /// # Errors
    /// `IndexError::LengthMismatch` if `variants`, `offsets` and `lengths` differ in length.
    pub fn new(variants: Vec<VariantInformation>, offsets: Vec<u64>, lengths: Vec<u64>, samples: Vec<String>, compression: Compression) -> Result<Self, IndexError> {
        if variants.len() != offsets.len() || variants.len() != lengths.len() {
            return Err(IndexError::LengthMismatch{variants: variants.len(), offsets: offsets.len(), lengths: lengths.len()})
        }
        let variants = variants.into_iter().map(Arc::new).collect();
        Ok(Self{variants, offsets, lengths, samples, compression})
    }

    /// Read the index at `index_path` (defaults to `<bgen>.index.gz`), or build it from the BGEN file
    /// and write it there if it does not exist yet.
    pub fn open(bgen: &Path, index_path: Option<&Path>) -> Result<Self, IndexError> {
        let index_path = index_path.map_or_else(|| Self::default_path(bgen), Path::to_path_buf);
        if index_path.exists() {
            return Self::read_text(&index_path)
        }
        info!("No variant index found at {}", index_path.display());
        let index = Self::from_bgen(bgen)?;
        index.write_text(&index_path)?;
        Ok(index)
    }

    #[must_use]
    pub fn default_path(bgen: &Path) -> PathBuf {
        let mut path = bgen.as_os_str().to_owned();
        path.push(".index.gz");
        PathBuf::from(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    #[must_use]
    pub fn variant(&self, i: usize) -> Option<&Arc<VariantInformation>> {
        self.variants.get(i)
    }

    #[must_use]
    pub fn variants(&self) -> &[Arc<VariantInformation>] {
        &self.variants
    }

    /// `(offset, length)` of the data block of variant `i`.
    #[must_use]
    pub fn block(&self, i: usize) -> Option<(u64, u64)> {
        Some((*self.offsets.get(i)?, *self.lengths.get(i)?))
    }

    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }
}
