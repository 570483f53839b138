//! Small synthetic cohorts shared by the integration tests.
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const N_SAMPLES: usize = 20;

/// Three bacterial variants; the last one is absent everywhere and never passes
/// the frequency filter.
pub fn bacterial_lines() -> Vec<String> {
    let alternating: Vec<&str> = (0..N_SAMPLES).map(|i| if i % 2 == 0 { "1" } else { "0" }).collect();
    let first_five: Vec<&str> = (0..N_SAMPLES).map(|i| if i < 5 { "1" } else { "0" }).collect();
    let absent = vec!["0"; N_SAMPLES];
    vec![alternating.join(","), first_five.join(","), absent.join(",")]
}

/// Four human variants. Line 3 carries the alternating bacterial pattern; line 4
/// has a malformed call.
pub fn human_lines() -> Vec<String> {
    let calls = ["0/0", "0/1", "1/1"];
    let cycling: Vec<&str> = (0..N_SAMPLES).map(|i| calls[i % 3]).collect();
    let first_eight: Vec<&str> = (0..N_SAMPLES).map(|i| if i < 8 { "0/1" } else { "0/0" }).collect();
    let alternating: Vec<&str> = (0..N_SAMPLES).map(|i| if i % 2 == 0 { "0/1" } else { "0/0" }).collect();
    let mut malformed = first_eight.clone();
    malformed[0] = "./.";
    vec![
        cycling.join(","),
        first_eight.join(","),
        alternating.join(","),
        malformed.join(","),
    ]
}

/// Pairs written per human line: every bacterial variant except the absent one.
pub const ROWS_PER_HUMAN_LINE: usize = 2;

pub fn write_plain(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

pub fn write_gz(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    enc.write_all((lines.join("\n") + "\n").as_bytes()).unwrap();
    enc.finish().unwrap();
    path
}

pub fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    flate2::read::MultiGzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}

/// Rows of a result table split into fields, header excluded.
pub fn data_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .skip(1)
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect()
}
