use std::{fs::File, path::{Path, PathBuf}, sync::Arc};

use located_error::prelude::*;
use log::info;
use memmap2::Mmap;

use crate::{decode::MAX_BLOCK_LENGTH, DecodeError, VariantIndex};

mod error;
pub use error::ReaderError;

mod source;
pub use source::{BgenVariantSource, MemorySource, RawVariant, VariantSource, MockVariantSource};

/// Memory-mapped random access to the variant data blocks of a BGEN file.
#[derive(Debug)]
pub struct BgenReader {
    path : PathBuf,
    mmap : Mmap,
    index: Arc<VariantIndex>,
}

impl BgenReader {
    pub fn open(path: &Path, index: Arc<VariantIndex>) -> Result<Self> {
        use ReaderError::{Open, Mmap as MapFile};
        let loc_msg = || format!("While attempting to memory-map {}", path.display());

        info!("Loading memory-mapped file: {}", path.display());
        let file = File::open(path).map_err(Open).with_loc(loc_msg)?;
        let mmap = unsafe { Mmap::map(&file).map_err(MapFile).with_loc(loc_msg)? };
        Ok(Self{path: path.to_path_buf(), mmap, index})
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VariantIndex> {
        &self.index
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw data block of variant `i`.
    ///
    /// # Errors
    /// - `DecodeError::Capacity` if the block is longer than `i32::MAX` bytes.
    /// - `ReaderError::OutOfBounds` if the block lies beyond the end of the file.
    pub fn block(&self, i: usize) -> Result<&[u8]> {
        let (variant, (offset, length)) = self.index.variant(i)
            .zip(self.index.block(i))
            .ok_or(ReaderError::VariantOutOfRange{index: i, len: self.index.len()})
            .loc("While retrieving a variant data block")?;

        if length > MAX_BLOCK_LENGTH {
            return Err(DecodeError::Capacity{variant_id: variant.id.clone(), expected: MAX_BLOCK_LENGTH, observed: length})
                .with_loc(|| format!("While reading {}", self.path.display()))
        }

        let file_length = self.mmap.len() as u64;
        let end = offset.checked_add(length).filter(|end| *end <= file_length);
        match end {
            Some(end) => Ok(&self.mmap[offset as usize..end as usize]),
            None => Err(ReaderError::OutOfBounds{variant: variant.id.clone(), offset, length, file_length})
                .with_loc(|| format!("While reading {}", self.path.display())),
        }
    }

    /// Identifying data and an owned copy of the data block of variant `i`.
    pub fn raw_variant(&self, i: usize) -> Result<RawVariant> {
        let block = self.block(i)?.to_vec();
        let info = self.index.variant(i)
            .cloned()
            .ok_or(ReaderError::VariantOutOfRange{index: i, len: self.index.len()})
            .loc("While retrieving a variant data block")?;
        Ok(RawVariant{info, block})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BgenWriter, Compression, SampleProbabilities, VariantInformation};
    use tempfile::TempDir;

    fn write_bgen(dir: &Path) -> (PathBuf, VariantIndex) {
        let path = dir.join("reader.bgen");
        let mut writer = BgenWriter::create(&path, vec!["s1".into(), "s2".into()], Compression::Zlib, 16).unwrap();
        for position in [100, 200, 300] {
            let info = VariantInformation::new("", "", "22", position, vec!["A".into(), "G".into()]);
            let samples = [SampleProbabilities::phased(&[0, 1], 2), SampleProbabilities::phased(&[1, 1], 2)];
            writer.write_variant(info, &samples).unwrap();
        }
        (path, writer.finish().unwrap())
    }

    #[test]
    fn blocks_match_index() {
        let dir = TempDir::new().unwrap();
        let (path, index) = write_bgen(dir.path());
        let reader = BgenReader::open(&path, Arc::new(index)).unwrap();
        for i in 0..3 {
            let (_, length) = reader.index().block(i).unwrap();
            let raw = reader.raw_variant(i).unwrap();
            assert_eq!(raw.block.len() as u64, length);
            assert_eq!(raw.info.position, (i as u32 + 1) * 100);
        }
        assert!(reader.block(3).is_err());
    }

    #[test]
    fn block_beyond_end_of_file() {
        let dir = TempDir::new().unwrap();
        let (path, index) = write_bgen(dir.path());
        let file_length = std::fs::metadata(&path).unwrap().len();
        let variants = index.variants().iter().map(|v| (**v).clone()).collect();
        let broken = VariantIndex::new(variants, vec![0, 0, file_length - 2], vec![4, 4, 10], index.samples().to_vec(), index.compression()).unwrap();
        let reader = BgenReader::open(&path, Arc::new(broken)).unwrap();
        assert!(reader.block(0).is_ok());
        let err = reader.block(2).unwrap_err();
        assert!(err.downcast_ref::<ReaderError>().is_some_and(|e| matches!(e, ReaderError::OutOfBounds{..})));
    }

    #[test]
    fn oversized_block_is_a_capacity_error() {
        let dir = TempDir::new().unwrap();
        let (path, index) = write_bgen(dir.path());
        let variants = index.variants().iter().map(|v| (**v).clone()).collect();
        let broken = VariantIndex::new(variants, vec![0; 3], vec![4, MAX_BLOCK_LENGTH + 1, 4], index.samples().to_vec(), index.compression()).unwrap();
        let reader = BgenReader::open(&path, Arc::new(broken)).unwrap();
        let err = reader.block(1).unwrap_err();
        let kind = err.downcast_ref::<DecodeError>().map(DecodeError::kind);
        assert_eq!(kind, Some(crate::ErrorKind::Capacity));
    }
}
