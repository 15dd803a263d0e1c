//! Mendelian error prevalence of a decoded variant, and phase correction of its children haplotypes.
//!
//! A child whose phase is flipped yields impossible non-transmitted dosages for its parents: `-1`
//! when a homozygous parent is credited with an allele it cannot carry, or `2` for a haploid
//! non-transmitted haplotype. The prevalence compares the number of such trios to the number
//! expected under Hardy-Weinberg at the parental allele frequency.
use genome::TrioSamples;
use log::trace;

use crate::{DecodeError, DecodedVariant};

const MINUS_ONE_THRESHOLD: f64 = -0.5;
const TWO_THRESHOLD: f64 = 1.5;
const SWAP_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MendelianCheck {
    pub allele    : usize,
    pub frequency : f64,
    pub n_children: usize,
    pub minus_one : usize,
    pub two       : usize,
    pub expected  : f64,
    pub prevalence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapOutcome {
    pub before : MendelianCheck,
    pub after  : MendelianCheck,
    pub swapped: bool,
}

/// Ratio of observed to expected Mendelian errors for `allele`, over the genotyped children.
///
/// Returns a NaN prevalence when no error is expected, e.g. for a monomorphic allele.
pub fn prevalence(variant: &DecodedVariant, trios: &TrioSamples, allele: usize) -> Result<MendelianCheck, DecodeError> {
    let Some(f) = variant.allele_frequency().get(allele).copied() else {
        return Err(DecodeError::AlleleOutOfRange{variant_id: variant.id().to_string(), allele, n_alleles: variant.n_alleles()})
    };

    let (mut n_children, mut minus_one, mut two) = (0, 0, 0);
    for trio in trios.trios() {
        let Some(h) = variant.trio_haplotypes(trio, allele)? else {
            continue
        };
        n_children += 1;
        if h[0] <= MINUS_ONE_THRESHOLD || h[3] <= MINUS_ONE_THRESHOLD {
            minus_one += 1;
        } else if h[0] >= TWO_THRESHOLD || h[3] >= TWO_THRESHOLD {
            two += 1;
        }
    }

    let n = n_children as f64;
    let expected = n * 2.0 * (1.0 - f) * (1.0 - f) * f + n * 2.0 * f * f * (1.0 - f);
    let prevalence = (minus_one + two) as f64 / expected;
    Ok(MendelianCheck{allele, frequency: f, n_children, minus_one, two, expected, prevalence})
}

/// Check every tested allele of `variant`, and swap its children haplotypes if the Mendelian error
/// prevalence of any of them exceeds 0.5.
///
/// Phase is shared by all alleles: the decision is taken once, on the unswapped variant, and every
/// outcome reports the final state of the variant.
pub fn check_and_swap(variant: &DecodedVariant, trios: &TrioSamples, alleles: &[usize]) -> Result<Vec<SwapOutcome>, DecodeError> {
    variant.set_swapped(false);
    let befores = alleles.iter()
        .map(|allele| prevalence(variant, trios, *allele))
        .collect::<Result<Vec<_>, _>>()?;

    let swap = befores.iter().any(|check| check.prevalence > SWAP_THRESHOLD);
    if !swap {
        return Ok(befores.into_iter().map(|before| SwapOutcome{before, after: before, swapped: false}).collect())
    }

    trace!("Swapping children alleles of {} (prevalence {:?})", variant.id(), befores.iter().map(|c| c.prevalence).collect::<Vec<_>>());
    variant.set_swapped(true);
    befores.into_iter()
        .map(|before| prevalence(variant, trios, before.allele).map(|after| SwapOutcome{before, after, swapped: true}))
        .collect()
}
