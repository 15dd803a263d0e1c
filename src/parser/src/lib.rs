use std::{
    fs::File,
    path::{Path, PathBuf},
    fmt::{self, Display, Formatter}, ffi::OsStr
};

use located_error::prelude::*;

use clap::{Parser, Subcommand, Args};
use serde::{Serialize, Deserialize};
use log::debug;

mod error;
pub use error::ParserError;

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(name="triogen-rs", author, version, about, long_about = None)]
#[clap(propagate_version = true)]
/// TrioGen-rs: stream phased trio genotypes from BGEN files
pub struct Cli {
    ///Set the verbosity level (-v -vv -vvv)
    ///
    /// Set the verbosity level of this program. Multiple levels allowed {n}
    ///
    /// -v: Info  |  -vv: Debug  | -vvv: Trace {n}
    ///
    /// Note that the program will still output warnings by default, even when this flag is off.
    /// Use The --quiet/-q to disable them
    #[clap(short='v', long, parse(from_occurrences), global=true)]
    pub verbose: u8,

    /// Disable warnings.
    ///
    /// By default, warnings are emmited and redirected to the console, even when verbose mode is off.
    /// Use this argument to disable this. Only errors will be displayed.
    #[clap(short='q', long, global=true)]
    pub quiet: bool,

    #[clap(subcommand)]
    pub commands: Commands,
}

impl Cli{
    /// Serialize command line arguments within a `.yaml` file.
    ///
    /// # Behavior
    /// - File naming follows the convention '{current time}-{module name}.yaml'. current time follows the format
    ///   `YYYY`-`MM`-`DD`T`hhmmss`
    /// - File is written at the root of the user-provided `--output-dir` folder.
    /// - `index` and `from-yaml` runs are not serialized.
    ///
    /// # Errors
    /// - if `serde_yaml` fails to parse `Self` to a string.
    /// - if the yaml file cannot be written within `--output-dir`
    pub fn serialize(&self) -> Result<Option<PathBuf>> {
        let output_dir = match &self.commands {
            Commands::Scan {scan} => &scan.output_dir,
            Commands::Index {..} | Commands::FromYaml {..} => return Ok(None),
        };

        // Parse arguments to yaml and print to console.
        let serialized = serde_yaml::to_string(&self)
            .loc("Failed to serialize command line arguments")?;
        debug!("\n---- Command line args ----\n{}\n---", serialized);

        let current_time = chrono::offset::Local::now().format("%Y-%m-%dT%H%M%S").to_string();
        let output_file = output_dir.join(format!("{current_time}-scan.yaml"));

        std::fs::write(&output_file, serialized)
            .with_loc(|| format!("Unable to serialize arguments into {}", output_file.display()))?;
        Ok(Some(output_file))
    }

    /// Deserialize a `.yaml` file into Command line arguments.
    ///
    /// # Errors
    /// - if the provided `.yaml` does not exist or does not carry read permissions
    /// - if `serde_yaml` fails to parse the provided file to `Self`.
    pub fn deserialize(yaml: &Path) -> Result<Self> {
        let file = File::open(yaml).with_loc(|| format!("Failed to open {}", yaml.display()))?;
        serde_yaml::from_reader(file).with_loc(|| format!("Failed to parse command line arguments from {}", yaml.display()))
    }
}

#[derive(Subcommand, Debug, Serialize, Deserialize)]
pub enum Commands {
    /// Build the variant index of a BGEN file.
    ///
    /// The index lists the identifiers, position and alleles of every variant, along with the offset and length
    /// of its data block. It is written as a gzip-compressed text file, next to the BGEN file by default.
    Index {
        #[clap(flatten)]
        index: IndexArgs,
    },

    /// Scan every variant for Mendelian inconsistencies and fix the phase of children.
    ///
    /// Variants are streamed through a sliding window shared by all worker threads. For each variant passing
    /// the --maf threshold, the prevalence of Mendelian errors among trios is computed for every tested allele,
    /// and the children haplotypes are swapped when it exceeds 0.5.
    Scan {
        #[clap(flatten)]
        scan: Box<Scan>, // Box<T> to mitigate the large size difference between variants.
    },

    /// Run triogen-rs using a previously generated .yaml configuration file.
    ///
    /// This allows users to easily re-apply a triogen-rs command using the exact same parameters
    /// and arguments.
    FromYaml {
        yaml: PathBuf,
    },
}

/// Input genotypes and their variant index.
#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Genotypes {
    /// Input phased genotypes, in BGEN v1.2 format (layout 2).
    #[clap(short='b', long, parse(try_from_os_str=valid_input_file))]
    pub bgen: PathBuf,

    /// Path to the variant index of --bgen.
    ///
    /// Defaults to '<bgen>.index.gz'. Files ending with '.gz' are gzip-compressed.
    #[clap(short='i', long, required(false))]
    pub index: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Serialize, Deserialize)]
pub struct IndexArgs {
    #[clap(flatten)]
    pub genotypes: Genotypes,

    /// Overwrite an existing index.
    #[clap(short='w', long)]
    pub overwrite: bool,
}

/// Mendelian consistency scan.
#[derive(Args, Debug, Serialize, Deserialize)]
pub struct Scan {
    #[clap(flatten)]
    pub genotypes: Genotypes,

    /// Tab-separated file listing trios, with columns 'child mother father'.
    ///
    /// The first line is a header. Unknown parents are written as 'NA'.
    #[clap(short='t', long, parse(try_from_os_str=valid_input_file))]
    pub trios: PathBuf,

    /// Output directory where results will be written.
    ///
    /// Note that triogen-rs will create the specified leaf directory if it is not present, but does not
    /// allow itself from creating parent directories.
    #[clap(short, long, default_value("triogen-output"), parse(try_from_os_str=valid_output_dir))]
    pub output_dir: PathBuf,

    /// Overwrite existing output files.
    ///
    /// By default, triogen-rs does not allow itself from overwriting existing results files. Use this flag
    /// to force this behaviour.
    #[clap(short='w', long)]
    pub overwrite: bool,

    /// Override the default inheritance table with a yaml file.
    ///
    /// The file maps each contig to the parental origin of every haplotype, for every child ploidy, along
    /// with the default ploidy of each parent. e.g.:{n}
    ///   "X":{n}
    ///     inheritance:{n}
    ///       1: [Mother]{n}
    ///       2: [Mother, Father]{n}
    ///     mother_ploidy: 2{n}
    ///     father_ploidy: 1{n}
    #[clap(short='I', long, required(false), parse(try_from_os_str=valid_input_file))]
    pub inheritance: Option<PathBuf>,

    /// Number of worker threads.
    ///
    /// Also sets the size of the thread pool used to decode variants.
    #[clap(short='@', long, default_value("1"))]
    pub threads: usize,

    /// Distance in bp to load ahead of the current variant.
    #[clap(short='U', long, default_value("1000000"))]
    pub upstream: u32,

    /// Distance in bp to keep behind the current variant.
    #[clap(short='D', long, default_value("1000000"))]
    pub downstream: u32,

    /// Upstream loading factor.
    ///
    /// With a loading factor of two, the buffer is filled twice what is needed. Higher values reduce the
    /// frequency of buffering, at the cost of memory. Must be greater than or equal to one.
    #[clap(long, default_value("1.5"), parse(try_from_str=parse_loading_factor))]
    pub upstream_loading_factor: f64,

    /// Downstream loading factor.
    ///
    /// With a loading factor of two, the buffer is only trimmed once twice the downstream distance is held.
    /// Must be greater than or equal to one.
    #[clap(long, default_value("1.05"), parse(try_from_str=parse_loading_factor))]
    pub downstream_loading_factor: f64,

    /// Number of variants read and decoded in parallel at each loading round.
    #[clap(short='B', long, default_value("1000"))]
    pub batch_size: usize,

    /// Minor allele frequency threshold.
    ///
    /// The frequency of each allele is estimated among the parents of genotyped children. Variants with no
    /// allele lying within ]maf, 1-maf[ are filtered out.
    #[clap(short='m', long, default_value("0.05"), parse(try_from_str=parse_maf))]
    pub maf: f64,

    /// Only process variants at or after this position (bp).
    #[clap(short='s', long, required(false))]
    pub start: Option<u32>,

    /// Only process variants at or before this position (bp).
    #[clap(short='e', long, required(false))]
    pub end: Option<u32>,

    /// Skip unreadable or oversized variants instead of aborting.
    ///
    /// Malformed data blocks, or blocks disagreeing with the variant index, still abort the run.
    #[clap(long)]
    pub skip_invalid: bool,
}

impl Scan {
    /// # Errors
    /// - if `--threads` is zero
    /// - if `--start` exceeds `--end`
    pub fn check(&self) -> Result<(), ParserError> {
        if self.threads == 0 {
            return Err(ParserError::InsufficientThreads)
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ParserError::InvalidRange{start, end})
            }
        }
        Ok(())
    }

    /// Output table of the scan: `<output-dir>/<bgen file stem>.mendelian.tsv`
    ///
    /// # Errors
    /// - if a file prefix cannot be created from the input BGEN file stem.
    pub fn output_file(&self) -> Result<PathBuf> {
        let file_stem = self.genotypes.bgen.file_stem()
            .ok_or_else(|| anyhow!(ParserError::ParseOutputPrefix(self.genotypes.bgen.display().to_string())))
            .loc("While parsing command line arguments")?;
        let mut filename = file_stem.to_os_string();
        filename.push(".mendelian.tsv");
        Ok(self.output_dir.join(filename))
    }

    /// Check if a given file already exists ; raise an error if such is the case, and the user did not explicitly
    /// allow file overwriting.
    ///
    /// # Errors
    /// - If the provided `path` already exists and the user did not specifically allow for file
    ///   overwrite using the `--overwrite` argument
    pub fn can_write_file(&self, path: &Path) -> Result<bool> {
        can_write_file(path, self.overwrite)
    }
}

pub fn can_write_file(path: &Path, overwrite: bool) -> Result<bool> {
    if ! overwrite && path.exists() {   // Check if this file already exists and/or if overwrite is allowed.
        return Err(ParserError::CannotOverwrite(path.display().to_string()))
            .loc( "While parsing command line arguments" )
    }
    Ok(true)
}

#[derive(Debug, Clone, Copy)]
pub enum FileEntity {File, Directory}

impl Display for FileEntity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::File      => write!(f, "File"),
            Self::Directory => write!(f, "Directory"),
        }
    }
}

impl FileEntity {
    fn validate(self, path: &Path) -> Result<(), ParserError> {
        use ParserError::InvalidFileEntity;
        let valid = match self {
            Self::File      => path.is_file(),
            Self::Directory => path.is_dir()
        };

        if valid {
            Ok(())
        } else {
            Err(InvalidFileEntity(self, path.display().to_string()))
        }
    }
}

fn assert_filesystem_entity_is_valid(s: &OsStr, entity: FileEntity) -> Result<()> {
    use ParserError::MissingFileEntity;
    let path = Path::new(s);
    if ! path.exists() {
        return Err(MissingFileEntity(entity, path.display().to_string()))
            .loc("While parsing arguments.")
    }

    entity.validate(path).loc("While parsing arguments.")
}

fn valid_input_file(s: &OsStr) -> Result<PathBuf> {
    assert_filesystem_entity_is_valid(s, FileEntity::File)
        .loc("While checking for file validity")?;
    Ok(PathBuf::from(s))
}

fn valid_output_dir(s: &OsStr) -> Result<PathBuf> {
    if ! Path::new(s).exists() {
        std::fs::create_dir(s)
            .with_loc(|| format!("Failed to create output directory {}", Path::new(s).display()))?;
    }
    assert_filesystem_entity_is_valid(s, FileEntity::Directory)
        .loc("While checking for directory validity")?;
    Ok(PathBuf::from(s))
}

fn parse_loading_factor(s: &str) -> Result<f64> {
    const MIN_FACTOR: f64 = 1.0;
    let factor = s.parse::<f64>().with_loc(|| format!("While parsing {s}"))?;
    match factor >= MIN_FACTOR {
        true  => Ok(factor),
        false => Err(anyhow!(ParserError::ParseLoadingFactor(MIN_FACTOR))).with_loc(|| format!("While parsing {s}"))
    }
}

fn parse_maf(s: &str) -> Result<f64> {
    const MIN_MAF: f64 = 0.0;
    const MAX_MAF: f64 = 0.5;
    let maf = s.parse::<f64>().with_loc(|| format!("While parsing {s}"))?;
    match (MIN_MAF..MAX_MAF).contains(&maf) {
        true  => Ok(maf),
        false => Err(anyhow!(ParserError::ParseMaf(MIN_MAF, MAX_MAF))).with_loc(|| format!("While parsing {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scan_args(dir: &Path, extra: &[&str]) -> Vec<String> {
        let bgen = dir.join("genotypes.bgen");
        let trios = dir.join("trios.tsv");
        std::fs::write(&bgen, b"").unwrap();
        std::fs::write(&trios, b"child\tmother\tfather\n").unwrap();
        let output_dir = dir.join("output");

        let mut args = vec!["triogen-rs", "scan", "-vv"].into_iter().map(String::from).collect::<Vec<_>>();
        for arg in ["--bgen", &bgen.display().to_string(), "--trios", &trios.display().to_string(), "--output-dir", &output_dir.display().to_string()] {
            args.push(arg.to_string());
        }
        args.extend(extra.iter().map(ToString::to_string));
        args
    }

    fn scan(cli: &Cli) -> &Scan {
        match &cli.commands {
            Commands::Scan {scan} => scan,
            other => panic!("Expected a scan command. Got {other:?}"),
        }
    }

    #[test]
    fn scan_defaults() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(scan_args(dir.path(), &[])).expect("parse");
        assert_eq!(cli.verbose, 2);
        let scan = scan(&cli);
        assert_eq!(scan.threads, 1);
        assert_eq!((scan.upstream, scan.downstream), (1_000_000, 1_000_000));
        assert!((scan.upstream_loading_factor - 1.5).abs() < f64::EPSILON);
        assert!((scan.maf - 0.05).abs() < f64::EPSILON);
        assert!(!scan.skip_invalid);
        assert!(scan.output_dir.is_dir());
        assert_eq!(scan.output_file().unwrap(), dir.path().join("output").join("genotypes.mendelian.tsv"));
        assert!(scan.check().is_ok());
    }

    #[test]
    fn invalid_values() {
        let dir = TempDir::new().unwrap();
        assert!(Cli::try_parse_from(scan_args(dir.path(), &["--upstream-loading-factor", "0.5"])).is_err());
        assert!(Cli::try_parse_from(scan_args(dir.path(), &["--maf", "0.5"])).is_err());
        assert!(Cli::try_parse_from(scan_args(dir.path(), &["--maf", "-0.1"])).is_err());

        let mut args = scan_args(dir.path(), &[]);
        args[4] = dir.path().join("missing.bgen").display().to_string();
        assert!(Cli::try_parse_from(args).is_err());

        let cli = Cli::try_parse_from(scan_args(dir.path(), &["--start", "100", "--end", "10"])).expect("parse");
        assert!(matches!(scan(&cli).check(), Err(ParserError::InvalidRange{start: 100, end: 10})));
        let cli = Cli::try_parse_from(scan_args(dir.path(), &["--threads", "0"])).expect("parse");
        assert!(matches!(scan(&cli).check(), Err(ParserError::InsufficientThreads)));
    }

    #[test]
    fn serialized_arguments_can_be_replayed() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from(scan_args(dir.path(), &["--maf", "0.1", "--skip-invalid", "-@", "4"])).expect("parse");
        let yaml = cli.serialize().expect("serialize").expect("scan arguments are serialized");
        assert!(yaml.starts_with(dir.path().join("output")));

        let replayed = Cli::deserialize(&yaml).expect("deserialize");
        let (original, replayed) = (scan(&cli), scan(&replayed));
        assert_eq!(replayed.genotypes.bgen, original.genotypes.bgen);
        assert_eq!(replayed.threads, 4);
        assert!(replayed.skip_invalid);
        assert!((replayed.maf - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn overwrite() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("existing.tsv");
        assert!(can_write_file(&file, false).is_ok());
        std::fs::write(&file, "").unwrap();
        assert!(can_write_file(&file, false).is_err());
        assert!(can_write_file(&file, true).is_ok());
    }
}
