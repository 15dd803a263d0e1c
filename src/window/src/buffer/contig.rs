use std::{collections::BTreeMap, sync::Arc};

use bgen::DecodedVariant;
use log::trace;

/// Buffered variants of a single contig, along with the reference-counted low bounds of its consumers.
#[derive(Debug, Default)]
pub(crate) struct ContigWindow {
    variants  : BTreeMap<u32, Vec<Arc<DecodedVariant>>>,
    n_variants: usize,
    /// Highest position loaded so far.
    max_bp    : u32,
    /// Lowest position still retained.
    min_bp    : u32,
    /// position -> number of consumers still needing it. May go negative when a release precedes its register.
    low_bounds: BTreeMap<u32, i64>,
}

impl ContigWindow {
    pub fn insert(&mut self, variant: Arc<DecodedVariant>) {
        let bp = variant.position();
        self.max_bp = self.max_bp.max(bp);
        self.variants.entry(bp).or_default().push(variant);
        self.n_variants += 1;
    }

    pub fn len(&self) -> usize {
        self.n_variants
    }

    pub fn max_bp(&self) -> u32 {
        self.max_bp
    }

    pub fn min_bp(&self) -> u32 {
        self.min_bp
    }

    pub fn contains(&self, bp: u32) -> bool {
        self.variants.contains_key(&bp)
    }

    pub fn range(&self, start: u32, end: u32) -> Vec<Arc<DecodedVariant>> {
        if start > end {
            return Vec::new()
        }
        self.variants.range(start..=end).flat_map(|(_, variants)| variants.iter().cloned()).collect()
    }

    /// Add `delta` to the count of `bp`. Returns `true` if the count reached zero and the entry was removed.
    pub fn adjust_low_bound(&mut self, bp: u32, delta: i64) -> bool {
        let count = self.low_bounds.entry(bp).or_insert(0);
        *count += delta;
        if *count == 0 {
            self.low_bounds.remove(&bp);
            return true
        }
        false
    }

    /// Whether some consumer still holds a bound on this contig.
    pub fn has_active_bounds(&self) -> bool {
        self.low_bounds.values().any(|count| *count > 0)
    }

    /// Evict every position lying more than `downstream` bp behind the lowest registered bound, once the
    /// slack exceeds `downstream x factor`. Returns the number of evicted variants.
    pub fn trim(&mut self, downstream: u32, factor: f64) -> usize {
        let Some(&min_bound) = self.low_bounds.keys().next() else {
            return 0
        };
        if f64::from(min_bound) - factor * f64::from(downstream) <= f64::from(self.min_bp) {
            return 0
        }

        let new_min = min_bound.saturating_sub(downstream);
        let retained = self.variants.split_off(&new_min);
        let evicted = std::mem::replace(&mut self.variants, retained).into_values().map(|v| v.len()).sum::<usize>();
        self.n_variants -= evicted;
        trace!("Trimmed {evicted} variants below {new_min} (previous low-water mark: {})", self.min_bp);
        self.min_bp = new_min;
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_may_go_negative() {
        let mut window = ContigWindow::default();
        assert!(!window.adjust_low_bound(10, -1));
        assert!(!window.has_active_bounds());
        assert!(window.adjust_low_bound(10, 1));
        assert!(window.low_bounds.is_empty());

        assert!(!window.adjust_low_bound(20, 1));
        assert!(!window.adjust_low_bound(20, 1));
        assert!(window.has_active_bounds());
        assert!(!window.adjust_low_bound(20, -1));
        assert!(window.adjust_low_bound(20, -1));
        assert!(!window.has_active_bounds());
    }

    #[test]
    fn trim_respects_loading_factor() {
        let mut window = ContigWindow::default();
        window.adjust_low_bound(100, 1);
        // 100 - 1.5 x 80 < 0: not enough slack yet.
        assert_eq!(window.trim(80, 1.5), 0);
        assert_eq!(window.min_bp(), 0);

        window.adjust_low_bound(100, -1);
        window.adjust_low_bound(200, 1);
        assert_eq!(window.trim(80, 1.5), 0);
        assert_eq!(window.min_bp(), 120);

        // Less than 1.5 x 80 past the low-water mark.
        window.adjust_low_bound(200, -1);
        window.adjust_low_bound(230, 1);
        assert_eq!(window.trim(80, 1.5), 0);
        assert_eq!(window.min_bp(), 120);
    }

    #[test]
    fn trim_without_bounds() {
        let mut window = ContigWindow::default();
        assert_eq!(window.trim(0, 1.0), 0);
        assert_eq!(window.min_bp(), 0);
    }
}
