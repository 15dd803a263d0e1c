use std::{collections::VecDeque, sync::Arc};

use anyhow::Result;
use indicatif::ProgressBar;
use log::{debug, info};
use logger::Logger;
use mockall::automock;
use parking_lot::Mutex;

use crate::VariantInformation;
use super::BgenReader;

const LOG_INTERVAL: usize = 100_000;

/// Identifying data of a variant along with its undecoded data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVariant {
    pub info : Arc<VariantInformation>,
    pub block: Vec<u8>,
}

/// Sequential producer of raw variant blocks, ordered by contig and position.
///
/// Shared between the threads of a buffer: implementors synchronize internally.
// @ TODO: automock is only needed by tests, but the window crate's tests rely on MockVariantSource.
#[automock]
pub trait VariantSource: Send + Sync {
    /// Next variant in file order, or `None` once the source is exhausted.
    fn next_variant(&self) -> Option<Result<RawVariant>>;
}

/// In-memory [`VariantSource`] over a list of already-read variants.
#[derive(Debug, Default)]
pub struct MemorySource {
    variants: Mutex<VecDeque<RawVariant>>,
}

impl MemorySource {
    #[must_use]
    pub fn new(variants: Vec<RawVariant>) -> Self {
        Self{variants: Mutex::new(variants.into())}
    }

    /// Number of variants not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.variants.lock().len()
    }
}

impl VariantSource for MemorySource {
    fn next_variant(&self) -> Option<Result<RawVariant>> {
        self.variants.lock().pop_front().map(Ok)
    }
}

/// Sequential [`VariantSource`] over a memory-mapped BGEN file.
///
/// Optionally restricted to variants whose position lies within `[start, end]`.
pub struct BgenVariantSource {
    reader  : BgenReader,
    cursor  : Mutex<usize>,
    start   : Option<u32>,
    end     : Option<u32>,
    progress: ProgressBar,
}

impl BgenVariantSource {
    #[must_use]
    pub fn new(reader: BgenReader) -> Self {
        let progress = Logger::progress_bar(reader.index().len() as u64, "variants");
        Self{reader, cursor: Mutex::new(0), start: None, end: None, progress}
    }

    #[must_use]
    pub fn with_range(mut self, start: Option<u32>, end: Option<u32>) -> Self {
        if start.is_some() || end.is_some() {
            debug!("Restricting {} to positions [{}, {}]",
                self.reader.path().display(),
                start.map_or_else(|| "-".to_string(), |s| s.to_string()),
                end.map_or_else(|| "-".to_string(), |e| e.to_string())
            );
        }
        self.start = start;
        self.end = end;
        self
    }

    fn in_range(&self, position: u32) -> bool {
        self.start.map_or(true, |start| position >= start) && self.end.map_or(true, |end| position <= end)
    }
}

impl VariantSource for BgenVariantSource {
    fn next_variant(&self) -> Option<Result<RawVariant>> {
        let mut cursor = self.cursor.lock();
        let n_variants = self.reader.index().len();
        loop {
            let i = *cursor;
            let Some(info) = self.reader.index().variant(i) else {
                self.progress.finish_and_clear();
                return None
            };
            *cursor += 1;
            self.progress.inc(1);
            if *cursor % LOG_INTERVAL == 0 {
                info!("{} variants processed out of {n_variants} ({:.1}%)", *cursor, *cursor as f64 / n_variants as f64 * 100.0);
            }
            if self.in_range(info.position) {
                return Some(self.reader.raw_variant(i))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BgenWriter, Compression, SampleProbabilities};
    use tempfile::TempDir;

    fn source(dir: &std::path::Path) -> BgenVariantSource {
        let path = dir.join("source.bgen");
        let mut writer = BgenWriter::create(&path, vec!["s1".into()], Compression::Zstd, 8).unwrap();
        for position in (1..=10).map(|i| i * 10) {
            let info = VariantInformation::new("", "", "3", position, vec!["A".into(), "C".into()]);
            writer.write_variant(info, &[SampleProbabilities::phased(&[0, 1], 2)]).unwrap();
        }
        let index = writer.finish().unwrap();
        BgenVariantSource::new(BgenReader::open(&path, Arc::new(index)).unwrap())
    }

    fn drain(source: &dyn VariantSource) -> Vec<u32> {
        std::iter::from_fn(|| source.next_variant())
            .map(|raw| raw.unwrap().info.position)
            .collect()
    }

    #[test]
    fn sequential_order() {
        let dir = TempDir::new().unwrap();
        let source = source(dir.path());
        assert_eq!(drain(&source), (1..=10).map(|i| i * 10).collect::<Vec<_>>());
        assert!(source.next_variant().is_none());
    }

    #[test]
    fn position_range() {
        let dir = TempDir::new().unwrap();
        let source = source(dir.path()).with_range(Some(25), Some(70));
        assert_eq!(drain(&source), vec![30, 40, 50, 60, 70]);

        let source = self::source(dir.path()).with_range(None, Some(20));
        assert_eq!(drain(&source), vec![10, 20]);
    }

    #[test]
    fn shared_between_threads() {
        let dir = TempDir::new().unwrap();
        let source = source(dir.path());
        let mut positions = std::thread::scope(|scope| {
            let handles = (0..4).map(|_| scope.spawn(|| drain(&source))).collect::<Vec<_>>();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        positions.sort_unstable();
        assert_eq!(positions, (1..=10).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn memory_source() {
        let info = Arc::new(VariantInformation::new("v", "", "1", 5, vec!["A".into(), "C".into()]));
        let source = MemorySource::new(vec![RawVariant{info: info.clone(), block: vec![1, 2]}, RawVariant{info, block: vec![3]}]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_variant().unwrap().unwrap().block, vec![1, 2]);
        assert_eq!(source.next_variant().unwrap().unwrap().block, vec![3]);
        assert!(source.next_variant().is_none());
    }
}
