//! Integration tests: invoke the compiled binaries end-to-end.
mod common;

use common::*;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn epistasis() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_epistasis"))
}

fn plan_chunks() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_plan-chunks"))
}

#[test]
fn screen_writes_results_file() {
    let dir = tempdir().unwrap();
    let bacterial = write_gz(dir.path(), "bact.csv.gz", &bacterial_lines());
    let human = write_gz(dir.path(), "human.csv.gz", &human_lines());
    let out = dir.path().join("results.tsv.gz");

    let status = Command::new(epistasis())
        .arg("--bacterial")
        .arg(&bacterial)
        .arg("--human")
        .arg(&human)
        .arg("--output")
        .arg(&out)
        .status()
        .expect("failed to launch epistasis binary");
    assert!(status.success(), "epistasis exited with {}", status);

    let text = read_gz(&out);
    assert!(text.starts_with("human_line\tbact_line\thuman_af\tbacterial_af"));
    assert_eq!(data_rows(&text).len(), 4 * ROWS_PER_HUMAN_LINE);
}

#[test]
fn screen_writes_to_stdout_by_default() {
    let dir = tempdir().unwrap();
    let bacterial = write_plain(dir.path(), "bact.csv", &bacterial_lines());
    let human = write_plain(dir.path(), "human.csv", &human_lines());

    let output = Command::new(epistasis())
        .arg("--bacterial")
        .arg(&bacterial)
        .arg("--human")
        .arg(&human)
        .args(["--chunk-start", "4", "--chunk-end", "5"])
        .output()
        .expect("failed to launch epistasis binary");
    assert!(output.status.success());

    let text = String::from_utf8(output.stdout).unwrap();
    let rows = data_rows(&text);
    assert_eq!(rows.len(), ROWS_PER_HUMAN_LINE);
    assert!(rows.iter().all(|r| r[0] == "4"));
}

#[test]
fn bad_bacterial_token_is_fatal() {
    let dir = tempdir().unwrap();
    let mut lines = bacterial_lines();
    lines[1] = lines[1].replacen('1', "2", 1);
    let bacterial = write_plain(dir.path(), "bact.csv", &lines);
    let human = write_plain(dir.path(), "human.csv", &human_lines());

    let output = Command::new(epistasis())
        .arg("--bacterial")
        .arg(&bacterial)
        .arg("--human")
        .arg(&human)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "no results before all bacterial variants load");
}

#[test]
fn invalid_options_are_fatal() {
    let dir = tempdir().unwrap();
    let bacterial = write_plain(dir.path(), "bact.csv", &bacterial_lines());
    let human = write_plain(dir.path(), "human.csv", &human_lines());
    let short_struct = write_plain(dir.path(), "struct.txt", &["0.1".to_string(), "0.2".to_string()]);

    let cases: Vec<Vec<String>> = vec![
        vec!["--chunk-start".into(), "3".into(), "--chunk-end".into(), "3".into()],
        vec!["--min-af".into(), "0.6".into(), "--max-af".into(), "0.4".into()],
        vec!["--struct".into(), short_struct.to_string_lossy().into()],
    ];
    for extra in cases {
        let status = Command::new(epistasis())
            .arg("--bacterial")
            .arg(&bacterial)
            .arg("--human")
            .arg(&human)
            .args(&extra)
            .status()
            .unwrap();
        assert!(!status.success(), "expected failure with {:?}", extra);
    }

    let status = Command::new(epistasis())
        .arg("--bacterial")
        .arg(dir.path().join("missing.csv"))
        .arg("--human")
        .arg(&human)
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn plan_chunks_prints_ranges() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = (0..10).map(|_| human_lines()[1].clone()).collect();
    let human = write_gz(dir.path(), "human.csv.gz", &lines);

    let output = Command::new(plan_chunks())
        .arg("--human")
        .arg(&human)
        .args(["-n", "3"])
        .output()
        .expect("failed to launch plan-chunks binary");
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "1\t5\n5\t8\n8\t11\n");
}
