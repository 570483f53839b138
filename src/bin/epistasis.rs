//! Pairwise association screen
//!
//! Reads every bacterial variant into memory, then streams a chunk of the human
//! variant file and tests each human variant against every bacterial variant.
//! Results go to `--output` (gzipped when it ends in `.gz`) or stdout.

use clap::Parser;
use epistasis_rust::{
    chunk::LineChunk,
    frequency::{DEFAULT_MAX_AF, DEFAULT_MIN_AF},
    io::{count_samples, finish_results, load_covariates, result_writer, VariantReader},
    logistic::{FitOptions, CONVERGENCE_LIMIT, MAX_NR_ITERATIONS, SE_LIMIT, START_BETA},
    PairwisePipeline, PipelineConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "epistasis",
    version,
    about = "Pairwise correlations between variants in two populations"
)]
struct Cli {
    /// Bacterial variants: one comma-separated line of 0/1 calls per variant (.gz ok)
    #[arg(short, long, required = true)]
    bacterial: PathBuf,

    /// Human variants: one comma-separated line of 0/0, 0/1, 1/1 calls per variant (.gz ok)
    #[arg(long, required = true)]
    human: PathBuf,

    /// Population structure covariates, one row per sample
    #[arg(long = "struct", alias = "covariates")]
    struct_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum allele frequency on either side
    #[arg(long, default_value_t = DEFAULT_MIN_AF)]
    min_af: f64,

    /// Maximum allele frequency on either side
    #[arg(long, default_value_t = DEFAULT_MAX_AF)]
    max_af: f64,

    /// Chi-squared p-value below which the logistic test is run
    #[arg(long, default_value_t = 1.0)]
    chisq: f64,

    /// LRT p-value below which a pair is counted as significant
    #[arg(long, default_value_t = 1.0)]
    pval: f64,

    /// First human line to test (1-based)
    #[arg(long, default_value_t = 1)]
    chunk_start: u64,

    /// Human line to stop before (default: end of file)
    #[arg(long)]
    chunk_end: Option<u64>,

    /// Maximum Newton-Raphson iterations
    #[arg(long, default_value_t = MAX_NR_ITERATIONS)]
    max_iter: usize,

    /// Newton-Raphson convergence limit on the log-likelihood
    #[arg(long, default_value_t = CONVERGENCE_LIMIT)]
    convergence: f64,

    /// Starting value for every coefficient except the intercept
    #[arg(long, default_value_t = START_BETA)]
    start_beta: f64,

    /// Standard errors above this are annotated "large-se"
    #[arg(long, default_value_t = SE_LIMIT)]
    se_limit: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    log::info!("epistasis: pairwise correlations between variants in two populations");

    // ===================================================================
    // 1. Validate options
    // ===================================================================
    let fit = FitOptions {
        max_iter: cli.max_iter,
        convergence_limit: cli.convergence,
        start_beta: cli.start_beta,
        se_limit: cli.se_limit,
    };
    let config = PipelineConfig::new(cli.min_af, cli.max_af, cli.chisq, cli.pval, fit)?;
    let chunk = match cli.chunk_end {
        Some(end) => LineChunk::new(cli.chunk_start, end)?,
        None if cli.chunk_start != 1 => LineChunk::new(cli.chunk_start, u64::MAX)?,
        None => LineChunk::all(),
    };
    log::debug!("{:?}", config);

    // ===================================================================
    // 2. Sample count and covariates
    // ===================================================================
    let n_samples = count_samples(&cli.human)?;
    log::info!("{} samples in {:?}", n_samples, cli.human);

    let covariates = match &cli.struct_file {
        Some(path) => Some(Arc::new(load_covariates(path, n_samples)?)),
        None => None,
    };

    // ===================================================================
    // 3. Bacterial variants
    // ===================================================================
    log::info!("Reading in all bacterial variants from {:?}", cli.bacterial);
    let mut pipeline = PairwisePipeline::new(n_samples, config)?;
    let mut bacterial = VariantReader::from_path(&cli.bacterial)?;
    pipeline.load_bacterial(&mut bacterial, covariates.as_ref())?;

    // ===================================================================
    // 4. Association tests
    // ===================================================================
    log::info!("Starting association tests");
    let mut writer = result_writer(cli.output.as_deref())?;
    let mut human = VariantReader::from_path(&cli.human)?;
    let summary = pipeline.run(&mut human, chunk, &mut writer)?;
    finish_results(writer)?;

    summary.log();
    log::info!("Done.");
    Ok(())
}
