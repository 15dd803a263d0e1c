use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

use genome::{Contig, InheritanceModel, Origin, TrioIndices, TrioSamples};

use crate::VariantInformation;
use super::DecodeError;

/// Stored haplotype probabilities of a single sample.
///
/// `probabilities` holds `(n_alleles - 1) x ploidy` values, haplotype-major: the probability of allele `a`
/// on haplotype `z` sits at `z * (n_alleles - 1) + a`. The last allele is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleHaplotypes {
    probabilities: Vec<f64>,
    summed       : Vec<f64>,
    ploidy       : u8,
}

impl SampleHaplotypes {
    /// Build from raw haplotype-major probabilities. The summed dosage of the last allele is
    /// `ploidy - sum(others)`, floored at zero.
    #[must_use]
    pub fn new(probabilities: Vec<f64>, n_alleles: usize, ploidy: u8) -> Self {
        let mut summed = vec![0.0; n_alleles];
        if n_alleles > 1 {
            for haplotype in probabilities.chunks_exact(n_alleles - 1) {
                for (allele, p) in haplotype.iter().enumerate() {
                    summed[allele] += p;
                }
            }
            let total: f64 = summed.iter().sum();
            summed[n_alleles - 1] = (f64::from(ploidy) - total).max(0.0);
        }
        Self{probabilities, summed, ploidy}
    }

    #[must_use]
    pub fn ploidy(&self) -> u8 {
        self.ploidy
    }

    /// Allele dosage summed over all haplotypes.
    #[must_use]
    pub fn summed(&self) -> &[f64] {
        &self.summed
    }

    #[must_use]
    pub fn raw(&self) -> &[f64] {
        &self.probabilities
    }

    /// Probability of `allele` on haplotype `z`.
    fn probability(&self, z: usize, allele: usize) -> f64 {
        let n_stored = self.summed.len() - 1;
        let haplotype = &self.probabilities[z * n_stored..(z + 1) * n_stored];
        match haplotype.get(allele) {
            Some(p) => *p,
            None    => (1.0 - haplotype.iter().sum::<f64>()).max(0.0),
        }
    }
}

/// A variant whose data block was decoded for a set of trios.
///
/// Haplotype probabilities are immutable once decoded. The only mutable state is the `swapped` flag,
/// which flips the parental origin of diploid children haplotypes in [`DecodedVariant::get_haplotypes`].
#[derive(Debug)]
pub struct DecodedVariant {
    info                : Arc<VariantInformation>,
    inheritance         : Arc<InheritanceModel>,
    n_alleles           : usize,
    ploidy              : Vec<u8>,
    missing             : Vec<bool>,
    samples             : Vec<Option<SampleHaplotypes>>,
    allele_frequency    : Vec<f64>,
    ordered_alleles     : Vec<usize>,
    n_children_genotyped: usize,
    swapped             : AtomicBool,
}

impl DecodedVariant {
    pub(crate) fn new(
        info       : Arc<VariantInformation>,
        inheritance: Arc<InheritanceModel>,
        ploidy     : Vec<u8>,
        missing    : Vec<bool>,
        samples    : Vec<Option<SampleHaplotypes>>,
        trios      : &TrioSamples,
    ) -> Self {
        let n_alleles = info.n_alleles();
        let mut variant = Self {
            info,
            inheritance,
            n_alleles,
            ploidy,
            missing,
            samples,
            allele_frequency: vec![f64::NAN; n_alleles],
            ordered_alleles: (0..n_alleles).collect(),
            n_children_genotyped: 0,
            swapped: AtomicBool::new(false),
        };
        variant.compute_allele_frequencies(trios);
        variant
    }

    /// Parental allele frequency, over the stored mothers and fathers of every child.
    ///
    /// Children whose parents are both missing contribute their own dosage instead. Parents shared by
    /// several children are counted once per child.
    fn compute_allele_frequencies(&mut self, trios: &TrioSamples) {
        let mut mass = vec![0.0; self.n_alleles];
        let mut ploidy_mass = vec![0.0; self.n_alleles];
        let mut add = |sample: &SampleHaplotypes| {
            for (allele, dosage) in sample.summed().iter().enumerate() {
                mass[allele] += dosage;
                ploidy_mass[allele] += f64::from(sample.ploidy());
            }
        };

        let mut n_children = 0;
        for trio in trios.trios() {
            let child  = trio.child.and_then(|i| self.sample(i));
            let mother = trio.mother.and_then(|i| self.sample(i));
            let father = trio.father.and_then(|i| self.sample(i));
            if child.is_some() {
                n_children += 1;
            }
            match (mother, father, child) {
                (None, None, Some(child)) => add(child),
                (mother, father, _) => {
                    mother.into_iter().chain(father).for_each(&mut add);
                }
            }
        }

        self.allele_frequency = mass.iter().zip(&ploidy_mass).map(|(m, p)| m / p).collect();
        let mut ordered = (0..self.n_alleles).collect::<Vec<usize>>();
        ordered.sort_by(|a, b| self.allele_frequency[*b].total_cmp(&self.allele_frequency[*a]).then(a.cmp(b)));
        self.ordered_alleles = ordered;
        self.n_children_genotyped = n_children;
    }

    #[must_use]
    pub fn info(&self) -> &Arc<VariantInformation> {
        &self.info
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.info.id
    }

    #[must_use]
    pub fn contig(&self) -> &Contig {
        &self.info.contig
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.info.position
    }

    #[must_use]
    pub fn n_alleles(&self) -> usize {
        self.n_alleles
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.ploidy.len()
    }

    #[must_use]
    pub fn ploidy(&self, sample: usize) -> Option<u8> {
        self.ploidy.get(sample).copied()
    }

    /// Whether the sample was flagged as missing in the data block. Only trio members are dropped on missingness.
    #[must_use]
    pub fn is_missing(&self, sample: usize) -> bool {
        self.missing.get(sample).copied().unwrap_or(true)
    }

    /// Stored haplotypes of `sample`, or `None` if the sample is a missing trio member.
    #[must_use]
    pub fn sample(&self, sample: usize) -> Option<&SampleHaplotypes> {
        self.samples.get(sample).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn is_stored(&self, sample: usize) -> bool {
        self.sample(sample).is_some()
    }

    #[must_use]
    pub fn summed_probability(&self, sample: usize, allele: usize) -> Option<f64> {
        self.sample(sample).and_then(|s| s.summed().get(allele).copied())
    }

    #[must_use]
    pub fn allele_frequency(&self) -> &[f64] {
        &self.allele_frequency
    }

    /// Allele indices, by descending parental frequency.
    #[must_use]
    pub fn ordered_alleles(&self) -> &[usize] {
        &self.ordered_alleles
    }

    #[must_use]
    pub fn n_children_genotyped(&self) -> usize {
        self.n_children_genotyped
    }

    /// Alleles `a >= 1` whose parental frequency lies strictly within `(maf, 1 - maf)`.
    #[must_use]
    pub fn tested_alleles(&self, maf: f64) -> Vec<usize> {
        self.allele_frequency.iter()
            .enumerate()
            .skip(1)
            .filter(|(_, f)| maf < **f && **f < 1.0 - maf)
            .map(|(allele, _)| allele)
            .collect()
    }

    #[must_use]
    pub fn passes_maf(&self, maf: f64) -> bool {
        !self.tested_alleles(maf).is_empty()
    }

    #[must_use]
    pub fn is_swapped(&self) -> bool {
        self.swapped.load(Ordering::Acquire)
    }

    /// Toggle the parental origin of diploid children haplotypes.
    pub fn swap_children_alleles(&self) {
        self.swapped.fetch_xor(true, Ordering::AcqRel);
    }

    pub fn set_swapped(&self, swapped: bool) {
        self.swapped.store(swapped, Ordering::Release);
    }

    /// Transmitted and non-transmitted dosage of `allele` for a trio:
    /// `[mother non-transmitted, mother transmitted, father transmitted, father non-transmitted]`.
    ///
    /// The total dosage of a missing parent is imputed as `frequency x default ploidy` on this contig.
    ///
    /// # Errors
    /// - `AlleleOutOfRange` if `allele >= n_alleles`
    /// - `MissingSample` if the child has no stored haplotypes.
    /// - `Configuration` if the child's ploidy has no inheritance mapping.
    pub fn get_haplotypes(&self, child: usize, mother: Option<usize>, father: Option<usize>, allele: usize) -> Result<[f64; 4], DecodeError> {
        if allele >= self.n_alleles {
            return Err(DecodeError::AlleleOutOfRange{variant_id: self.info.id.clone(), allele, n_alleles: self.n_alleles})
        }
        let child_haplotypes = self.sample(child)
            .ok_or_else(|| DecodeError::MissingSample{variant_id: self.info.id.clone(), sample: child})?;

        let configuration = |source| DecodeError::Configuration{variant_id: self.info.id.clone(), source};
        let rules = self.inheritance.contig(&self.info.contig).map_err(configuration)?;

        let ploidy = child_haplotypes.ploidy();
        let origins = match ploidy {
            0 => &[][..],
            _ => self.inheritance.inheritance(&self.info.contig, ploidy).map_err(configuration)?,
        };
        let swap = ploidy == 2 && self.is_swapped();

        let (mut mother_transmitted, mut father_transmitted) = (0.0, 0.0);
        for (z, origin) in origins.iter().enumerate() {
            let p = child_haplotypes.probability(z, allele);
            let origin = if swap { origin.swap() } else { *origin };
            match origin {
                Origin::Mother => mother_transmitted += p,
                Origin::Father => father_transmitted += p,
            }
        }

        let parent_total = |parent: Option<usize>, origin: Origin| {
            parent.and_then(|i| self.summed_probability(i, allele))
                .unwrap_or_else(|| self.allele_frequency[allele] * f64::from(rules.default_ploidy(origin)))
        };
        let mother_total = parent_total(mother, Origin::Mother);
        let father_total = parent_total(father, Origin::Father);

        Ok([
            mother_total - mother_transmitted,
            mother_transmitted,
            father_transmitted,
            father_total - father_transmitted,
        ])
    }

    /// [`DecodedVariant::get_haplotypes`] for a resolved trio. Returns `None` when the child is not genotyped.
    pub fn trio_haplotypes(&self, trio: &TrioIndices, allele: usize) -> Result<Option<[f64; 4]>, DecodeError> {
        match trio.child.filter(|child| self.is_stored(*child)) {
            Some(child) => self.get_haplotypes(child, trio.mother, trio.father, allele).map(Some),
            None        => Ok(None),
        }
    }
}
