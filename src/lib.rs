extern crate parser;
extern crate logger;

use std::path::PathBuf;

use parser::{Cli, Commands::*, IndexArgs};
use bgen::VariantIndex;
use located_error::prelude::*;

#[macro_use]
extern crate log;

mod scan;
pub use scan::{ScanRecord, ScanSummary, HEADER};

/// Build and write the variant index of a BGEN file.
///
/// # Errors
/// - if the index file already exists and `--overwrite` was not provided.
/// - if the BGEN header or any variant header is malformed.
fn index(args: &IndexArgs) -> Result<PathBuf> {
    let bgen = &args.genotypes.bgen;
    let index_path = args.genotypes.index.clone().unwrap_or_else(|| VariantIndex::default_path(bgen));
    parser::can_write_file(&index_path, args.overwrite)?;

    info!("Indexing {}...", bgen.display());
    let index = VariantIndex::from_bgen(bgen).with_loc(|| format!("While indexing {}", bgen.display()))?;
    index.write_text(&index_path).with_loc(|| format!("While writing variant index {}", index_path.display()))?;
    info!("Wrote {} variants and {} samples into {}", index.len(), index.samples().len(), index_path.display());
    Ok(index_path)
}

/// Unpack the command line arguments and run the requested module.
///
/// # Errors
/// Any error raised by the requested module.
pub fn run(cli: Cli) -> Result<()> {
    match cli.commands {
        Index {index: args} => {
            index(&args)?;
        },

        Scan {scan: args} => {
            args.check()?;
            // ----------------------------- Set the global thread pool used to decode variants.
            if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(args.threads).build_global() {
                debug!("Reusing the existing global thread pool: {e}");
            }
            let summary = scan::run(&args)?;
            info!("{summary}");
        },

        FromYaml {yaml} => {
            let cli = Cli::deserialize(&yaml)?;
            self::run(cli)?;
        },
    };
    Ok(())
}
