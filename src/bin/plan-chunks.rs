//! Splits the human variant file into line ranges for independent `epistasis` runs.
//!
//! Prints one `start<TAB>end` line per chunk, suitable for
//! `epistasis --chunk-start <start> --chunk-end <end>`.

use clap::Parser;
use epistasis_rust::{chunk::partition, io::count_lines};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "plan-chunks",
    version,
    about = "Partitions a human variant file into line chunks for parallel epistasis runs"
)]
struct Cli {
    /// Human variant file (.gz ok)
    #[arg(long, required = true)]
    human: PathBuf,

    /// Number of chunks
    #[arg(short = 'n', long, default_value_t = 1)]
    chunks: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let total = count_lines(&cli.human)?;
    let chunks = partition(total, cli.chunks)?;
    log::info!(
        "{} human lines in {:?}, split into {} chunks",
        total,
        cli.human,
        chunks.len()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for chunk in &chunks {
        writeln!(out, "{}\t{}", chunk.start(), chunk.end())?;
    }
    Ok(())
}
