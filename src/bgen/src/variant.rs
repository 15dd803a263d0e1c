use genome::Contig;
use itertools::Itertools;

/// Identifying data of a single variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInformation {
    pub id      : String,
    pub rsid    : String,
    pub contig  : Contig,
    pub position: u32,
    pub alleles : Vec<String>,
}

impl VariantInformation {
    /// An empty `id` is replaced by `<contig>_<position>_<allele1>_<allele2>...`
    #[must_use]
    pub fn new(id: impl Into<String>, rsid: impl Into<String>, contig: impl Into<Contig>, position: u32, alleles: Vec<String>) -> Self {
        let contig = contig.into();
        let mut id: String = id.into();
        if id.is_empty() {
            id = Self::default_id(&contig, position, &alleles);
        }
        Self{id, rsid: rsid.into(), contig, position, alleles}
    }

    #[must_use]
    pub fn default_id(contig: &Contig, position: u32, alleles: &[String]) -> String {
        format!("{contig}_{position}_{}", alleles.join("_"))
    }

    #[must_use]
    pub fn n_alleles(&self) -> usize {
        self.alleles.len()
    }

    /// Every allele except `allele`, joined with `,`.
    #[must_use]
    pub fn other_alleles(&self, allele: usize) -> String {
        self.alleles.iter()
            .enumerate()
            .filter(|(i, _)| *i != allele)
            .map(|(_, a)| a)
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alleles(a: &[&str]) -> Vec<String> {
        a.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn default_id() {
        let variant = VariantInformation::new("", "rs12", "7", 1200, alleles(&["A", "T"]));
        assert_eq!(variant.id, "7_1200_A_T");
        let variant = VariantInformation::new("snp1", "rs12", "7", 1200, alleles(&["A", "T"]));
        assert_eq!(variant.id, "snp1");
    }

    #[test]
    fn other_alleles() {
        let variant = VariantInformation::new("v", "rs1", "1", 10, alleles(&["A", "C", "G"]));
        assert_eq!(variant.other_alleles(0), "C,G");
        assert_eq!(variant.other_alleles(1), "A,G");
        assert_eq!(variant.n_alleles(), 3);
    }
}
