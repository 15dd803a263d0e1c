mod common;
use common::{read_rows, TestVariant, TrioDataset, CONSISTENT, FLIPPED, PATERNAL, REFERENCE};

use bgen::VariantIndex;
#[cfg(test)] use pretty_assertions::assert_eq;

fn dataset() -> TrioDataset {
    TrioDataset::new(&[
        TestVariant::new("1", 1000, &[FLIPPED, FLIPPED, FLIPPED, CONSISTENT]),
        TestVariant::new("1", 2000, &[CONSISTENT; 4]),
        TestVariant::new("1", 3000, &[REFERENCE; 4]),
        TestVariant::new("2", 500, &[CONSISTENT, CONSISTENT, PATERNAL, CONSISTENT]),
    ])
}

fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(ToString::to_string).collect()
}

fn expected_rows() -> Vec<Vec<String>> {
    // f = 7/16 ; expected = 8 x f x (1 - f) = 1.96875 ; 3 errors before the swap, 1 after.
    vec![
        row(&["1", "1000", "1_1000_A_T", "rs1000", "T", "A", "0.437500", "4", "1.523810", "0.507937", "1", "1"]),
        row(&["1", "2000", "1_2000_A_T", "rs2000", "T", "A", "0.250000", "4", "0.000000", "0.000000", "0", "1"]),
        row(&["2", "500",  "2_500_A_T",  "rs500",  "T", "A", "0.250000", "4", "0.000000", "0.000000", "0", "0"]),
    ]
}

fn scan(data: &TrioDataset, output_dir: &str, extra: &[&str]) -> anyhow::Result<()> {
    let mut args = vec![
        "triogen-rs", "scan",
        "--bgen", data.bgen.to_str().unwrap(),
        "--trios", data.trios.to_str().unwrap(),
        "--output-dir", output_dir,
    ];
    args.extend_from_slice(extra);
    let cli = <parser::Cli as clap::Parser>::try_parse_from(args)?;
    triogen_rs::run(cli)
}

#[test]
fn index_then_scan() {
    let data = dataset();
    let index_path = data.path("trios.bgi.gz");
    let index_path = index_path.to_str().unwrap();

    triogen_rs::run(cli!["index", "--bgen", data.bgen.to_str().unwrap(), "--index", index_path]).unwrap();
    let index = VariantIndex::read_text(index_path.as_ref()).unwrap();
    assert_eq!(index.len(), 4);
    assert_eq!(index.samples().len(), 12);

    let output_dir = data.path("output");
    scan(&data, output_dir.to_str().unwrap(), &["--index", index_path]).unwrap();

    let output = output_dir.join("trios.mendelian.tsv");
    let table = std::fs::read_to_string(&output).unwrap();
    assert_eq!(table.lines().next(), Some(triogen_rs::HEADER));
    assert_eq!(read_rows(&output), expected_rows());
}

#[test]
fn index_is_never_overwritten_silently() {
    let data = dataset();
    let bgen = data.bgen.to_str().unwrap();
    triogen_rs::run(cli!["index", "--bgen", bgen]).unwrap();
    assert!(VariantIndex::default_path(&data.bgen).exists());

    assert!(triogen_rs::run(cli!["index", "--bgen", bgen]).is_err());
    triogen_rs::run(cli!["index", "--bgen", bgen, "--overwrite"]).unwrap();
}

#[test]
fn scan_builds_missing_index() {
    let data = dataset();
    let output_dir = data.path("output");
    scan(&data, output_dir.to_str().unwrap(), &[]).unwrap();
    assert!(VariantIndex::default_path(&data.bgen).exists());
    assert_eq!(read_rows(&output_dir.join("trios.mendelian.tsv")), expected_rows());
}

#[test]
fn concurrent_workers() {
    let data = dataset();
    let output_dir = data.path("output");
    scan(&data, output_dir.to_str().unwrap(), &["--threads", "3", "--batch-size", "1"]).unwrap();

    let mut rows = read_rows(&output_dir.join("trios.mendelian.tsv"));
    rows.sort();
    let mut expected = expected_rows();
    expected.sort();
    assert_eq!(rows, expected);
}

#[test]
fn position_range() {
    let data = dataset();
    let output_dir = data.path("output");
    scan(&data, output_dir.to_str().unwrap(), &["--start", "1500", "--end", "2500"]).unwrap();
    assert_eq!(
        read_rows(&output_dir.join("trios.mendelian.tsv")),
        vec![row(&["1", "2000", "1_2000_A_T", "rs2000", "T", "A", "0.250000", "4", "0.000000", "0.000000", "0", "0"])]
    );

    let err = scan(&data, output_dir.to_str().unwrap(), &["--start", "2500", "--end", "1500", "--overwrite"]);
    assert!(err.is_err());
}

#[test]
fn maf_threshold() {
    let data = dataset();
    let output_dir = data.path("output");
    scan(&data, output_dir.to_str().unwrap(), &["--maf", "0.3"]).unwrap();
    // Neighbors below the threshold are never buffered.
    let mut expected = expected_rows().remove(0);
    expected[11] = "0".to_string();
    assert_eq!(read_rows(&output_dir.join("trios.mendelian.tsv")), vec![expected]);
}

#[test]
fn results_are_never_overwritten_silently() {
    let data = dataset();
    let output_dir = data.path("output");
    let output_dir = output_dir.to_str().unwrap();
    scan(&data, output_dir, &[]).unwrap();
    assert!(scan(&data, output_dir, &[]).is_err());
    scan(&data, output_dir, &["--overwrite"]).unwrap();
}

#[test]
fn replay_from_yaml() {
    let data = dataset();
    let output_dir = data.path("output");
    let output_file = output_dir.join("trios.mendelian.tsv");

    let cli = cli![
        "scan",
        "--bgen", data.bgen.to_str().unwrap(),
        "--trios", data.trios.to_str().unwrap(),
        "--output-dir", output_dir.to_str().unwrap(),
        "--overwrite"
    ];
    let yaml = cli.serialize().unwrap().expect("scan arguments should be serialized");
    triogen_rs::run(cli).unwrap();
    std::fs::remove_file(&output_file).unwrap();

    triogen_rs::run(cli!["from-yaml", yaml.to_str().unwrap()]).unwrap();
    assert_eq!(read_rows(&output_file), expected_rows());
}
