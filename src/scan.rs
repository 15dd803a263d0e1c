use std::{
    fmt::{self, Display, Formatter},
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{atomic::{AtomicBool, Ordering}, Arc},
};

use bgen::{mendelian::{self, SwapOutcome}, BgenReader, BgenVariantSource, BlockDecoder, DecodedVariant, VariantIndex, VariantSource};
use genome::{InheritanceModel, TrioMap, TrioSamples};
use located_error::prelude::*;
use parking_lot::Mutex;
use parser::Scan;
use window::{BufferStats, LoadPolicy, WindowConfig, WindowedBuffer};

pub const HEADER: &str = "#contig\tposition\tid\trsid\ttested_allele\tother_alleles\tfrequency\tn_children\tprevalence_before\tprevalence_after\tswapped\tneighbors";

/// Mendelian consistency of a single tested allele.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub contig       : String,
    pub position     : u32,
    pub id           : String,
    pub rsid         : String,
    pub allele       : String,
    pub other_alleles: String,
    pub frequency    : f64,
    pub n_children   : usize,
    pub before       : f64,
    pub after        : f64,
    pub swapped      : bool,
    /// Other variants found within `[position - downstream, position + upstream]`.
    pub neighbors    : usize,
}

impl ScanRecord {
    fn new(variant: &DecodedVariant, outcome: &SwapOutcome, neighbors: usize) -> Self {
        let info = variant.info();
        let allele = outcome.before.allele;
        Self {
            contig       : info.contig.to_string(),
            position     : info.position,
            id           : info.id.clone(),
            rsid         : info.rsid.clone(),
            allele       : info.alleles.get(allele).cloned().unwrap_or_default(),
            other_alleles: info.other_alleles(allele),
            frequency    : outcome.before.frequency,
            n_children   : outcome.before.n_children,
            before       : outcome.before.prevalence,
            after        : outcome.after.prevalence,
            swapped      : outcome.swapped,
            neighbors,
        }
    }
}

impl Display for ScanRecord {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{}\t{:.6}\t{:.6}\t{}\t{}",
            self.contig,
            self.position,
            self.id,
            self.rsid,
            self.allele,
            self.other_alleles,
            self.frequency,
            self.n_children,
            self.before,
            self.after,
            u8::from(self.swapped),
            self.neighbors
        )
    }
}

/// Totals of a `scan` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub output  : PathBuf,
    pub variants: usize,
    pub tested  : usize,
    pub swapped : usize,
    pub buffer  : BufferStats,
}

impl Display for ScanSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Scanned {} variants ({} tested alleles, {} variants swapped). Results written to {}",
            self.variants, self.tested, self.swapped, self.output.display()
        )
    }
}

#[derive(Debug, Default)]
struct WorkerCounts {
    variants: usize,
    tested  : usize,
    swapped : usize,
}

/// Stream every variant of the input BGEN file through a sliding window, check the Mendelian consistency
/// of each tested allele, and write one row per allele into `<output-dir>/<bgen stem>.mendelian.tsv`.
///
/// # Errors
/// - if the output file already exists, and `--overwrite` was not provided.
/// - if the trio file, the inheritance table or the variant index cannot be parsed.
/// - if any variant fails to decode (see `--skip-invalid`).
pub fn run(args: &Scan) -> Result<ScanSummary> {
    let output = args.output_file()?;
    args.can_write_file(&output)?;

    // ----------------------------- Parse trios and inheritance.
    let trio_map = TrioMap::from_file(&args.trios)
        .with_loc(|| format!("While parsing trio file {}", args.trios.display()))?;
    let inheritance = match &args.inheritance {
        Some(path) => InheritanceModel::from_yaml(path).with_loc(|| format!("While parsing inheritance table {}", path.display()))?,
        None       => InheritanceModel::default(),
    };

    // ----------------------------- Open the genotypes.
    let bgen = &args.genotypes.bgen;
    let index = VariantIndex::open(bgen, args.genotypes.index.as_deref())
        .with_loc(|| format!("While opening the variant index of {}", bgen.display()))?;
    let trios = Arc::new(trio_map.resolve(index.samples()));
    if trios.is_empty() {
        warn!("None of the trios listed in {} could be found in {}", args.trios.display(), bgen.display());
    }
    let index = Arc::new(index);
    let decoder = BlockDecoder::from_index(&index, trios.clone(), Arc::new(inheritance));
    let source = BgenVariantSource::new(BgenReader::open(bgen, index)?).with_range(args.start, args.end);

    let config = WindowConfig {
        upstream                 : args.upstream,
        downstream               : args.downstream,
        upstream_loading_factor  : args.upstream_loading_factor,
        downstream_loading_factor: args.downstream_loading_factor,
        batch_size               : args.batch_size,
        maf                      : args.maf,
        policy                   : LoadPolicy::from_skip_invalid(args.skip_invalid),
    };
    let buffer = WindowedBuffer::new(source, decoder, config).loc("While initializing the sliding window")?;

    // ----------------------------- Run workers.
    let file = File::create(&output).with_loc(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{HEADER}")?;
    let writer = Mutex::new(writer);

    info!("Scanning variants using {} worker thread(s)...", args.threads);
    let abort = AtomicBool::new(false);
    let results = std::thread::scope(|scope| {
        let workers = (0..args.threads)
            .map(|_| scope.spawn(|| scan_worker(&buffer, &trios, args.maf, &writer, &abort)))
            .collect::<Vec<_>>();
        workers.into_iter()
            .map(|worker| worker.join().map_err(|_| anyhow!(loc!("A scan worker panicked"))))
            .collect::<Vec<_>>()
    });

    // A loading failure takes precedence over the errors it caused in the workers.
    let mut summary = ScanSummary{output: output.clone(), buffer: buffer.finish()?, ..Default::default()};
    for result in results {
        let counts = result??;
        summary.variants += counts.variants;
        summary.tested   += counts.tested;
        summary.swapped  += counts.swapped;
    }

    writer.into_inner().flush().with_loc(|| format!("Failed to write {}", output.display()))?;
    Ok(summary)
}

/// Consume variants until the buffer runs dry, or another worker failed.
fn scan_worker<S, W>(buffer: &WindowedBuffer<S>, trios: &TrioSamples, maf: f64, writer: &Mutex<W>, abort: &AtomicBool) -> Result<WorkerCounts>
where
    S: VariantSource,
    W: Write,
{
    let mut counts = WorkerCounts::default();
    while let Some(variant) = buffer.next() {
        let scanned = scan_variant(buffer, &variant, trios, maf, writer);
        buffer.release_min_bp(variant.contig(), variant.position())
            .with_loc(|| format!("While releasing {}", variant.id()))?;

        match scanned {
            Ok((tested, swapped)) => {
                counts.variants += 1;
                counts.tested   += tested;
                counts.swapped  += swapped;
            },
            Err(e) => {
                abort.store(true, Ordering::Relaxed);
                return Err(e)
            }
        }

        if abort.load(Ordering::Relaxed) {
            break
        }
    }
    Ok(counts)
}

/// Check and fix the phase of `variant`, then write one row per tested allele. Returns `(tested alleles, swapped variants)`.
fn scan_variant<S, W>(buffer: &WindowedBuffer<S>, variant: &Arc<DecodedVariant>, trios: &TrioSamples, maf: f64, writer: &Mutex<W>) -> Result<(usize, usize)>
where
    S: VariantSource,
    W: Write,
{
    let loc_msg = || format!("While scanning variant {}", variant.id());
    let alleles = variant.tested_alleles(maf);
    let outcomes = mendelian::check_and_swap(variant, trios, &alleles).with_loc(loc_msg)?;

    let (upstream, downstream) = (buffer.config().upstream, buffer.config().downstream);
    let bp = variant.position();
    let neighbors = buffer.range_query(variant.contig(), bp.saturating_sub(downstream), bp.saturating_add(upstream))
        .with_loc(loc_msg)?
        .iter()
        .filter(|neighbor| !Arc::ptr_eq(neighbor, variant))
        .count();

    let mut writer = writer.lock();
    for outcome in &outcomes {
        writeln!(writer, "{}", ScanRecord::new(variant, outcome, neighbors)).with_loc(loc_msg)?;
    }
    Ok((outcomes.len(), usize::from(variant.is_swapped())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgen::{mendelian::MendelianCheck, VariantInformation};

    fn check(prevalence: f64) -> MendelianCheck {
        MendelianCheck{allele: 1, frequency: 0.25, n_children: 4, minus_one: 1, two: 0, expected: 1.5, prevalence}
    }

    #[test]
    fn record_display() {
        let info = VariantInformation::new("", "rs1", "3", 1200, vec!["A".into(), "C".into(), "G".into()]);
        let record = ScanRecord {
            contig       : info.contig.to_string(),
            position     : info.position,
            id           : info.id.clone(),
            rsid         : info.rsid.clone(),
            allele       : "C".into(),
            other_alleles: info.other_alleles(1),
            frequency    : 0.25,
            n_children   : 4,
            before       : check(0.75).prevalence,
            after        : check(0.0).prevalence,
            swapped      : true,
            neighbors    : 12,
        };
        assert_eq!(record.to_string(), "3\t1200\t3_1200_A_C_G\trs1\tC\tA,G\t0.250000\t4\t0.750000\t0.000000\t1\t12");
        assert_eq!(HEADER.split('\t').count(), record.to_string().split('\t').count());
    }

    #[test]
    fn undefined_prevalence_is_displayed_as_nan() {
        let record = ScanRecord {
            contig: "1".into(), position: 1, id: "v".into(), rsid: ".".into(), allele: "T".into(),
            other_alleles: "A".into(), frequency: 0.0, n_children: 0, before: f64::NAN, after: f64::NAN,
            swapped: false, neighbors: 0
        };
        assert!(record.to_string().contains("\tNaN\tNaN\t0\t0"));
    }
}
