//! End-to-end runs through configuration, real files and the batch runner.
//!
//! These tests write raw inputs and artifacts into temp directories and
//! check what lands on disk.

use std::fs;
use std::path::Path;

use priceflow_core::{ErrorKind, PipelineState};
use priceflow_runner::{
    list_artifacts, read_csv_artifact, run_batch, OutputFormat, PipelineConfig, RunSummary,
    SourceConfig,
};

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("pipeline.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn equity_config_writes_reference_csv() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("equities");
    let path = write_config(
        dir.path(),
        &format!(
            "symbols = [\"AAPL\", \"MSFT\"]\ndestination = {:?}\n[source]\ntype = \"equity\"\n",
            dest.display().to_string()
        ),
    );

    let config = PipelineConfig::from_file(&path).unwrap();
    let frame = config
        .build_pipeline()
        .unwrap()
        .run(config.symbols.clone(), &config.destination)
        .unwrap();

    let aapl = fs::read_to_string(dest.join("AAPL.csv")).unwrap();
    let lines: Vec<&str> = aapl.lines().collect();
    assert_eq!(lines[0], "symbol,timestamp,price,return,normalized_price");
    assert_eq!(lines[1], "AAPL,2024-06-03 00:00:00+00:00,194.03,,1.0");
    assert_eq!(lines.len(), 4);

    let msft = read_csv_artifact(&dest.join("MSFT.csv")).unwrap();
    assert_eq!(msft.rows(), &frame.rows()[3..]);
}

#[test]
fn raw_csv_files_are_cleaned_and_featurized() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    // Unsorted, duplicated, with a blank price on the second day.
    fs::write(
        raw.join("AAPL.csv"),
        "timestamp,price\n\
         2024-06-05,197.12\n\
         2024-06-03,194.03\n\
         2024-06-03,194.03\n\
         2024-06-04,\n",
    )
    .unwrap();

    let mut config = PipelineConfig::new(
        SourceConfig::Csv { dir: raw.clone() },
        vec!["AAPL".into(), "TSLA".into()],
        dir.path().join("out"),
    );
    config.output.format = OutputFormat::Parquet;
    let pipeline = config.build_pipeline().unwrap();

    let (frame, report) = pipeline
        .run_with_report(config.symbols.clone(), &config.destination)
        .unwrap();

    assert_eq!(report.extracted_rows, 4);
    assert_eq!(report.cleaned_rows, 3);
    assert_eq!(report.missing_symbols, vec!["TSLA".to_string()]);
    let prices: Vec<f64> = frame.iter().filter_map(|r| r.price.value()).collect();
    assert_eq!(prices, vec![194.03, 194.03, 197.12]);

    let artifacts = list_artifacts(&config.destination).unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].symbol, "AAPL");
    assert_eq!(artifacts[0].rows, 3);
}

#[test]
fn unparsable_raw_price_fails_in_cleaning() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join("MSFT.csv"), "timestamp,price\n2024-06-03,n/a\n").unwrap();

    let config = PipelineConfig::new(
        SourceConfig::Csv { dir: raw },
        vec!["MSFT".into()],
        dir.path().join("out"),
    );
    let err = config
        .build_pipeline()
        .unwrap()
        .run(config.symbols.clone(), &config.destination)
        .unwrap_err();

    assert_eq!(err.stage, PipelineState::Cleaning);
    assert_eq!(err.kind(), ErrorKind::InvalidPrice);
    assert_eq!(err.symbol(), Some("MSFT"));
    assert!(!config.destination.exists());
}

#[test]
fn empty_symbol_list_creates_empty_destination() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(SourceConfig::Crypto, vec![], dir.path().join("none"));

    let frame = config
        .build_pipeline()
        .unwrap()
        .run(config.symbols.clone(), &config.destination)
        .unwrap();

    assert!(frame.is_empty());
    assert!(config.destination.is_dir());
    assert!(list_artifacts(&config.destination).unwrap().is_empty());
}

#[test]
fn batch_runs_both_reference_pipelines() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = vec![
        PipelineConfig::new(
            SourceConfig::Equity,
            SourceConfig::Equity.default_symbols(),
            dir.path().join("equities"),
        )
        .to_job()
        .unwrap(),
        PipelineConfig::new(
            SourceConfig::Crypto,
            SourceConfig::Crypto.default_symbols(),
            dir.path().join("crypto"),
        )
        .to_job()
        .unwrap(),
    ];

    let outcomes = run_batch(&jobs, true).unwrap();
    let summaries: Vec<RunSummary> = outcomes.iter().map(|o| o.summary()).collect();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].rows, 6);
    assert_eq!(summaries[1].rows, 6);
    assert_ne!(summaries[0].frame_hash, summaries[1].frame_hash);
    for summary in &summaries {
        assert_eq!(summary.artifacts.len(), 2);
        assert!(summary.artifacts.iter().all(|p| p.exists()));
    }

    // A second batch over the same inputs reproduces the same frames.
    let again = run_batch(&jobs, false).unwrap();
    assert_eq!(again[0].summary().frame_hash, summaries[0].frame_hash);
}

#[test]
fn synthetic_config_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        &format!(
            "symbols = [\"SPY\"]\ndestination = {:?}\n\
             [source]\ntype = \"synthetic\"\nstart = \"2024-01-01\"\nend = \"2024-01-31\"\n\
             [output]\nformat = \"parquet\"\n",
            dir.path().join("synthetic").display().to_string()
        ),
    );

    let job = PipelineConfig::from_file(&path).unwrap().to_job().unwrap();
    let outcome = run_batch(std::slice::from_ref(&job), false).unwrap().remove(0);

    // January 2024 has 23 weekdays.
    assert_eq!(outcome.frame.len(), 23);
    assert!(outcome.frame.has_features());
    assert!(dir.path().join("synthetic/SPY.parquet").exists());
}
