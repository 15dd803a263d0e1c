use std::{fs, path::{Path, PathBuf}};

use bgen::{BgenWriter, Compression, SampleProbabilities, VariantInformation};

use super::Fixture;

/// Phased haplotypes of a single trio: child `[maternal, paternal]`, mother, father.
pub type TrioHaplotypes = [[usize; 2]; 3];

pub const CONSISTENT: TrioHaplotypes = [[1, 0], [1, 0], [0, 0]];
pub const PATERNAL  : TrioHaplotypes = [[0, 1], [0, 0], [1, 0]];
/// Child phase flipped: leaves its homozygous reference father with a non-transmitted dosage of -1.
pub const FLIPPED   : TrioHaplotypes = [[0, 1], [1, 1], [0, 0]];
pub const REFERENCE : TrioHaplotypes = [[0, 0], [0, 0], [0, 0]];

/// Biallelic `A/T` variant, genotyped for every trio.
pub struct TestVariant {
    pub contig  : &'static str,
    pub position: u32,
    pub trios   : Vec<TrioHaplotypes>,
}

impl TestVariant {
    pub fn new(contig: &'static str, position: u32, trios: &[TrioHaplotypes]) -> Self {
        Self{contig, position, trios: trios.to_vec()}
    }
}

/// A BGEN file and its trio file, written in a temporary directory.
///
/// Samples are laid out as consecutive `C<i>`, `M<i>`, `F<i>` triplets.
pub struct TrioDataset {
    pub dir  : Fixture,
    pub bgen : PathBuf,
    pub trios: PathBuf,
}

impl TrioDataset {
    pub fn new(variants: &[TestVariant]) -> Self {
        let n_trios = variants.first().map_or(0, |variant| variant.trios.len());
        let dir = Fixture::dir("triogen-test-data");
        let bgen = dir.join("trios.bgen");
        let trios = dir.join("trios.tsv");

        let samples = (0..n_trios)
            .flat_map(|i| [format!("C{i}"), format!("M{i}"), format!("F{i}")])
            .collect::<Vec<_>>();

        let mut writer = BgenWriter::create(&bgen, samples, Compression::Zlib, 8).expect("Failed to create BGEN file");
        for variant in variants {
            assert_eq!(variant.trios.len(), n_trios);
            let info = VariantInformation::new(
                "", format!("rs{}", variant.position), variant.contig, variant.position, vec!["A".into(), "T".into()]
            );
            let probabilities = variant.trios.iter()
                .flatten()
                .map(|haplotypes| SampleProbabilities::phased(haplotypes, 2))
                .collect::<Vec<_>>();
            writer.write_variant(info, &probabilities).expect("Failed to write variant");
        }
        writer.finish().expect("Failed to finish BGEN file");

        let mut trio_file = String::from("child\tmother\tfather\n");
        for i in 0..n_trios {
            trio_file.push_str(&format!("C{i}\tM{i}\tF{i}\n"));
        }
        fs::write(&trios, trio_file).expect("Failed to write trio file");

        Self{dir, bgen, trios}
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

/// Rows of a tab-separated table, without its header.
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap_or_else(|_| panic!("Failed to open {}", path.display()))
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split('\t').map(ToString::to_string).collect())
        .collect()
}
