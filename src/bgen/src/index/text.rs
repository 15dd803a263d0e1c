use std::{fs::File, io::{BufRead, BufReader, BufWriter, Read, Write}, path::Path};

use flate2::{read::MultiGzDecoder, write::GzEncoder};
use itertools::Itertools;
use log::{debug, info};

use crate::{Compression, VariantInformation};
use super::{IndexError, VariantIndex, MAX_PREALLOCATED_VARIANTS};

pub const INDEX_HEADER: &str = "# TrioGen_bgen_index_v.1.0.1";
const COMPRESSION_PREFIX: &str = "# Compression:\t";
const SAMPLES_HEADER: &str = "# Samples";
const VARIANTS_PREFIX: &str = "# Variants:\t";
const COLUMNS: [&str; 7] = ["variantId", "rsId", "contig", "bp", "alleles", "index", "blockSize"];

fn is_gzipped(path: &Path) -> bool {
    path.extension().unwrap_or_default() == "gz"
}

type Lines = std::iter::Enumerate<std::io::Lines<BufReader<Box<dyn Read>>>>;

/// Next `(line number, line)`, or `MissingSection(section)` at the end of the file.
fn next_line(lines: &mut Lines, section: &'static str) -> Result<(usize, String), IndexError> {
    match lines.next() {
        Some((i, line)) => Ok((i + 1, line.map_err(IndexError::ReadIndex)?)),
        None            => Err(IndexError::MissingSection(section)),
    }
}

fn parse_field<T: std::str::FromStr>(line: usize, field: &'static str, value: &str) -> Result<T, IndexError> {
    value.parse::<T>().map_err(|_| IndexError::ParseField{line, field, value: value.to_string()})
}

impl VariantIndex {
    /// Write the text index. The output is gzip-compressed if `path` ends with `.gz`.
    pub fn write_text(&self, path: &Path) -> Result<(), IndexError> {
        info!("Writing variant index to {}", path.display());
        let file = File::create(path).map_err(|source| IndexError::Open{path: path.to_path_buf(), source})?;
        if is_gzipped(path) {
            let mut writer = BufWriter::new(GzEncoder::new(file, flate2::Compression::default()));
            self.write_lines(&mut writer).map_err(IndexError::WriteIndex)?;
            writer.into_inner()
                .map_err(|e| IndexError::WriteIndex(e.into_error()))?
                .finish()
                .map_err(IndexError::WriteIndex)?;
        } else {
            let mut writer = BufWriter::new(file);
            self.write_lines(&mut writer).map_err(IndexError::WriteIndex)?;
            writer.flush().map_err(IndexError::WriteIndex)?;
        }
        Ok(())
    }

    fn write_lines<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{INDEX_HEADER}")?;
        writeln!(writer, "{COMPRESSION_PREFIX}{}", self.compression.as_u8())?;
        writeln!(writer, "{SAMPLES_HEADER}")?;
        writeln!(writer, "{}", self.samples.join("\t"))?;
        writeln!(writer, "{VARIANTS_PREFIX}{}", self.len())?;
        writeln!(writer, "{}", COLUMNS.join("\t"))?;
        for ((variant, offset), length) in self.variants.iter().zip(&self.offsets).zip(&self.lengths) {
            writeln!(writer, "{}\t{}\t{}\t{}\t{}\t{offset}\t{length}",
                variant.id, variant.rsid, variant.contig, variant.position, variant.alleles.join(",")
            )?;
        }
        Ok(())
    }

    /// Read a text index written by [`VariantIndex::write_text`].
    pub fn read_text(path: &Path) -> Result<Self, IndexError> {
        info!("Reading variant index from {}", path.display());
        let file = File::open(path).map_err(|source| IndexError::Open{path: path.to_path_buf(), source})?;
        let reader: Box<dyn Read> = if is_gzipped(path) {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let mut lines = BufReader::new(reader).lines().enumerate();

        let (_, header) = next_line(&mut lines, INDEX_HEADER)?;
        if header != INDEX_HEADER {
            return Err(IndexError::InvalidHeader{expected: INDEX_HEADER, found: header})
        }

        let (n, line) = next_line(&mut lines, COMPRESSION_PREFIX)?;
        let value = line.strip_prefix(COMPRESSION_PREFIX).ok_or(IndexError::MissingSection(COMPRESSION_PREFIX))?;
        let compression = Compression::try_from(parse_field::<u8>(n, "compression", value)?)
            .map_err(IndexError::Compression)?;

        let (_, line) = next_line(&mut lines, SAMPLES_HEADER)?;
        if line != SAMPLES_HEADER {
            return Err(IndexError::MissingSection(SAMPLES_HEADER))
        }
        let (_, line) = next_line(&mut lines, SAMPLES_HEADER)?;
        let samples = match line.is_empty() {
            true  => Vec::new(),
            false => line.split('\t').map(ToString::to_string).collect_vec(),
        };

        let (n, line) = next_line(&mut lines, VARIANTS_PREFIX)?;
        let value = line.strip_prefix(VARIANTS_PREFIX).ok_or(IndexError::MissingSection(VARIANTS_PREFIX))?;
        let n_variants = parse_field::<usize>(n, "variant count", value)?;
        next_line(&mut lines, "column names")?;

        let capacity = n_variants.min(MAX_PREALLOCATED_VARIANTS);
        let (mut variants, mut offsets, mut lengths) = (Vec::with_capacity(capacity), Vec::with_capacity(capacity), Vec::with_capacity(capacity));
        for (i, line) in lines {
            let n = i + 1;
            let line = line.map_err(IndexError::ReadIndex)?;
            let fields = line.split('\t').collect_vec();
            let [id, rsid, contig, position, alleles, offset, length] = fields[..] else {
                return Err(IndexError::ColumnCount{line: n, expected: COLUMNS.len(), found: fields.len()})
            };
            let alleles = alleles.split(',').map(ToString::to_string).collect_vec();
            variants.push(VariantInformation::new(id, rsid, contig, parse_field(n, "position", position)?, alleles));
            offsets.push(parse_field(n, "block offset", offset)?);
            lengths.push(parse_field(n, "block length", length)?);
        }

        if variants.len() != n_variants {
            return Err(IndexError::VariantCount{expected: n_variants, found: variants.len()})
        }
        debug!("Variant index lists {n_variants} variants and {} samples", samples.len());
        Self::new(variants, offsets, lengths, samples, compression)
    }
}
