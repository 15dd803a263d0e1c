use std::{collections::VecDeque, sync::Arc};

use ahash::{AHashMap, AHashSet};
use bgen::{BlockDecoder, DecodedVariant, VariantSource};
use genome::Contig;
use located_error::prelude::*;
use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rayon::prelude::*;

use crate::{WindowConfig, WindowError};

mod contig;
use contig::ContigWindow;

/// Mutable state of a [`WindowedBuffer`]. Always accessed under its lock.
#[derive(Default)]
struct BufferState {
    contigs     : AHashMap<Contig, ContigWindow>,
    /// Buffered contigs, in load order. The last one is the loading frontier.
    contig_order: VecDeque<Contig>,
    /// Contigs the source moved past.
    completed   : AHashSet<Contig>,
    /// Variants not handed out yet.
    queue       : VecDeque<Arc<DecodedVariant>>,
    /// Contig of the latest handed out variant.
    current     : Option<Contig>,
    loading     : bool,
    exhausted   : bool,
    failure     : Option<anyhow::Error>,
    n_buffered  : usize,
    peak        : usize,
    n_loaded    : usize,
    n_filtered  : usize,
    n_skipped   : usize,
}

impl BufferState {
    fn is_done(&self) -> bool {
        self.exhausted || self.failure.is_some()
    }

    /// Whether variants of `contig` may still arrive from the source.
    fn is_frontier(&self, contig: &str) -> bool {
        !self.is_done() && self.contig_order.back().map_or(false, |last| last.as_str() == contig)
    }

    /// Whether loading failed while variants of `contig` could still arrive.
    fn is_aborted(&self, contig: &str) -> bool {
        self.failure.is_some() && self.contig_order.back().map_or(false, |last| last.as_str() == contig)
    }

    fn window_mut(&mut self, contig: &str) -> Result<&mut ContigWindow, WindowError> {
        self.contigs.get_mut(contig).ok_or_else(|| WindowError::ContigNotBuffered(contig.to_string()))
    }

    fn insert(&mut self, variant: DecodedVariant) -> Result<(), WindowError> {
        let contig = variant.contig().clone();
        let bp = variant.position();
        if self.completed.contains(&contig) {
            let previous = self.contig_order.back().map_or_else(String::new, ToString::to_string);
            return Err(WindowError::UnsortedSource{contig: contig.to_string(), position: bp, previous})
        }

        if self.contig_order.back() != Some(&contig) {
            if let Some(previous) = self.contig_order.back() {
                debug!("Done loading contig {previous}");
                self.completed.insert(previous.clone());
            }
            debug!("Loading contig {contig}");
            self.contig_order.push_back(contig.clone());
        }

        let window = self.contigs.entry(contig.clone()).or_default();
        if bp < window.max_bp() {
            return Err(WindowError::UnsortedSource{
                contig: contig.to_string(),
                position: bp,
                previous: format!("{contig}:{}", window.max_bp())
            })
        }

        // Every buffered variant holds its own position until its consumer releases it.
        window.adjust_low_bound(bp, 1);
        let variant = Arc::new(variant);
        window.insert(variant.clone());
        self.queue.push_back(variant);

        self.n_buffered += 1;
        self.n_loaded += 1;
        self.peak = self.peak.max(self.n_buffered);
        Ok(())
    }

    fn trim(&mut self, contig: &str, config: &WindowConfig) {
        if let Some(window) = self.contigs.get_mut(contig) {
            self.n_buffered -= window.trim(config.downstream, config.downstream_loading_factor);
        }
        self.drop_idle_contigs();
    }

    /// Drop leading contigs that are neither the current one nor needed by any consumer.
    fn drop_idle_contigs(&mut self) {
        while let Some(first) = self.contig_order.front() {
            if self.current.as_ref().map_or(true, |current| current == first) {
                break
            }
            if self.contigs.get(first).map_or(false, ContigWindow::has_active_bounds) {
                break
            }
            if let Some(contig) = self.contig_order.pop_front() {
                if let Some(window) = self.contigs.remove(&contig) {
                    debug!("Dropping contig {contig} from buffer ({} variants)", window.len());
                    self.n_buffered -= window.len();
                }
            }
        }
    }
}

/// Number of variants seen by a [`WindowedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Variants inserted into the buffer.
    pub loaded  : usize,
    /// Variants below the minor allele frequency threshold.
    pub filtered: usize,
    /// Variants dropped by the loading policy.
    pub skipped : usize,
    /// Highest number of variants held at once.
    pub peak    : usize,
}

/// Concurrent, memory-bounded sliding window over the decoded variants of a [`VariantSource`].
///
/// Variants are handed out one by one through [`WindowedBuffer::next`], in source order, while
/// [`WindowedBuffer::range_query`] gives access to their neighborhood. Each handed out variant holds a low
/// bound on its position: positions lying more than `downstream` bp behind the lowest bound of a contig
/// are evicted, and a contig is dropped altogether once no consumer needs it anymore. Consumers must
/// therefore call [`WindowedBuffer::release_min_bp`] once done with a variant.
///
/// Loading happens on whichever thread needs data. Only one thread loads at a time: the others wait
/// until the batch is inserted, then retry.
pub struct WindowedBuffer<S: VariantSource> {
    source : S,
    decoder: BlockDecoder,
    config : WindowConfig,
    state  : Mutex<BufferState>,
    loaded : Condvar,
}

impl<S: VariantSource> WindowedBuffer<S> {
    pub fn new(source: S, decoder: BlockDecoder, config: WindowConfig) -> Result<Self, WindowError> {
        config.validate()?;
        debug!("Buffering {} bp upstream (x{}) and {} bp downstream (x{}), in batches of {} variants",
            config.upstream, config.upstream_loading_factor,
            config.downstream, config.downstream_loading_factor,
            config.batch_size
        );
        Ok(Self{source, decoder, config, state: Mutex::new(BufferState::default()), loaded: Condvar::new()})
    }

    #[must_use]
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Next variant in source order, or `None` once the source is exhausted or loading failed.
    pub fn next(&self) -> Option<Arc<DecodedVariant>> {
        let mut state = self.state.lock();
        loop {
            if state.failure.is_some() {
                return None
            }
            if let Some(variant) = state.queue.pop_front() {
                let contig = variant.contig().clone();
                state.current = Some(contig.clone());
                state.drop_idle_contigs();
                self.ensure_loaded(&mut state, &contig, variant.position());
                return Some(variant)
            }
            if state.exhausted {
                return None
            }
            if state.loading {
                self.loaded.wait(&mut state);
                continue
            }
            self.load_batch(&mut state);
        }
    }

    /// All buffered variants of `contig` with a position within `[start, end]`.
    ///
    /// Blocks until `end` is loaded, unless the source moved on to another contig or is exhausted. Fails with
    /// `LoadingAborted` if loading failed before reaching `end`.
    pub fn range_query(&self, contig: &str, start: u32, end: u32) -> Result<Vec<Arc<DecodedVariant>>, WindowError> {
        let mut state = self.state.lock();
        loop {
            let window = state.contigs.get(contig).ok_or_else(|| WindowError::ContigNotBuffered(contig.to_string()))?;
            if start < window.min_bp() {
                return Err(WindowError::WindowStartOutOfRange{contig: contig.to_string(), start, min: window.min_bp(), max: window.max_bp()})
            }
            if end > window.max_bp() && state.is_aborted(contig) {
                return Err(WindowError::LoadingAborted{contig: contig.to_string(), end, max: window.max_bp()})
            }
            if end <= window.max_bp() || !state.is_frontier(contig) {
                return Ok(window.range(start, end))
            }

            match state.loading {
                true  => self.loaded.wait(&mut state),
                false => self.load_batch(&mut state),
            }
        }
    }

    /// Register a consumer bound at `bp`: positions `>= bp - downstream` are retained until released.
    pub fn register_min_bp(&self, contig: &str, bp: u32) -> Result<(), WindowError> {
        self.adjust_low_bound(contig, bp, 1)
    }

    /// Release a bound at `bp`. Releasing a bound that was never registered is allowed: the matching
    /// registration then cancels it out.
    pub fn release_min_bp(&self, contig: &str, bp: u32) -> Result<(), WindowError> {
        self.adjust_low_bound(contig, bp, -1)
    }

    fn adjust_low_bound(&self, contig: &str, bp: u32, delta: i64) -> Result<(), WindowError> {
        let mut state = self.state.lock();
        if state.window_mut(contig)?.adjust_low_bound(bp, delta) {
            state.trim(contig, &self.config);
        }
        Ok(())
    }

    /// Load until `bp + upstream x upstream_loading_factor` is covered, if `bp + upstream` is not.
    fn ensure_loaded(&self, state: &mut MutexGuard<BufferState>, contig: &Contig, bp: u32) {
        let max_bp = |state: &BufferState| state.contigs.get(contig).map_or(0, ContigWindow::max_bp);
        let target = f64::from(bp) + self.config.upstream_loading_factor * f64::from(self.config.upstream);
        if !state.is_frontier(contig) || u64::from(bp) + u64::from(self.config.upstream) <= u64::from(max_bp(state)) {
            return
        }

        while state.is_frontier(contig) && target >= f64::from(max_bp(state)) {
            match state.loading {
                true  => self.loaded.wait(state),
                false => self.load_batch(state),
            }
        }
    }

    /// Read and decode one batch with the lock released, then insert it in source order.
    fn load_batch(&self, state: &mut MutexGuard<BufferState>) {
        state.loading = true;
        let decoded = MutexGuard::unlocked(state, || {
            let raw_variants = std::iter::from_fn(|| self.source.next_variant())
                .take(self.config.batch_size)
                .collect::<Vec<_>>();
            raw_variants.into_par_iter()
                .map(|raw| {
                    let raw = raw?;
                    let id = raw.info.id.clone();
                    self.decoder.decode(raw.info, &raw.block).with_loc(|| format!("While decoding variant {id}"))
                })
                .collect::<Vec<_>>()
        });

        if decoded.is_empty() {
            debug!("Variant source exhausted");
            state.exhausted = true;
        }

        for result in decoded {
            let variant = match result {
                Ok(variant) => variant,
                Err(e) if self.config.policy.is_skippable(&e) => {
                    warn!("Skipping variant: {e:#}");
                    state.n_skipped += 1;
                    continue
                },
                Err(e) => {
                    state.failure = Some(e);
                    break
                }
            };

            if !variant.passes_maf(self.config.maf) {
                trace!("{} does not pass the MAF threshold ({})", variant.id(), self.config.maf);
                state.n_filtered += 1;
                continue
            }

            if let Err(e) = state.insert(variant) {
                state.failure = Some(anyhow!(e));
                break
            }
        }

        trace!("{} variants buffered ({} queued)", state.n_buffered, state.queue.len());
        state.loading = false;
        self.loaded.notify_all();
    }

    /// Number of variants currently held across all contigs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().n_buffered
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a variant at `contig:bp` is currently held.
    #[must_use]
    pub fn contains(&self, contig: &str, bp: u32) -> bool {
        self.state.lock().contigs.get(contig).map_or(false, |window| window.contains(bp))
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        let state = self.state.lock();
        BufferStats{loaded: state.n_loaded, filtered: state.n_filtered, skipped: state.n_skipped, peak: state.peak}
    }

    /// Consume the buffer, returning the error that stopped loading, if any.
    pub fn finish(self) -> Result<BufferStats> {
        let stats = self.stats();
        info!("{} variants buffered, {} below the MAF threshold, {} skipped. At most {} variants were held at once.",
            stats.loaded, stats.filtered, stats.skipped, stats.peak
        );
        match self.state.into_inner().failure {
            Some(e) => Err(e).loc("While loading variants into the sliding window"),
            None    => Ok(stats),
        }
    }
}
