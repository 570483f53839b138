//! Module for running the pairwise screen: every human variant against every
//! bacterial variant, chi-squared first and the likelihood-ratio test for pairs
//! that pass.
use crate::chisq::{chi_squared_test, ScreenError};
use crate::chunk::LineChunk;
use crate::frequency::{FrequencyBounds, FrequencyError};
use crate::genotype::{code_human, GenotypeError};
use crate::io::{IoError, PairResult, VariantReader};
use crate::logistic::{FitOptions, LogisticFitter, ModelError};
use crate::lrt::likelihood_ratio_test_pair;
use crate::null_model::NullModelEstimator;
use crate::pair::{PairError, PairRecord};
use crate::pvalue::PValueCalculator;
use csv::Writer;
use ndarray::Array2;
use std::io::{Read, Write};
use std::sync::Arc;
use thiserror::Error;

/// Human lines between progress messages.
const PROGRESS_EVERY: u64 = 1000;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Pair(#[from] PairError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("Failed to write results: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Frequency(#[from] FrequencyError),
    #[error("Cutoff {name} must be in (0, 1], got {value}")]
    Cutoff { name: &'static str, value: f64 },
    #[error("Distribution error: {0}")]
    Stats(#[from] statrs::StatsError),
    #[error("Bacterial line {line}: {source}")]
    BacterialLine { line: u64, source: PairError },
    #[error("Human line {line}: {source}")]
    HumanLine { line: u64, source: GenotypeError },
}

/// Filters and cutoffs for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub bounds: FrequencyBounds,
    /// Pairs with a chi-squared p-value below this go on to the logistic fit
    pub chisq_cutoff: f64,
    /// LRT p-values below this are counted as significant
    pub pval_cutoff: f64,
    pub fit: FitOptions,
}

impl PipelineConfig {
    pub fn new(
        min_af: f64,
        max_af: f64,
        chisq_cutoff: f64,
        pval_cutoff: f64,
        fit: FitOptions,
    ) -> Result<Self, PipelineError> {
        for (name, value) in [("chisq", chisq_cutoff), ("pval", pval_cutoff)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::Cutoff { name, value });
            }
        }
        Ok(Self {
            bounds: FrequencyBounds::new(min_af, max_af)?,
            chisq_cutoff,
            pval_cutoff,
            fit,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bounds: FrequencyBounds::default(),
            chisq_cutoff: 1.0,
            pval_cutoff: 1.0,
            fit: FitOptions::default(),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub human_lines: u64,
    pub total_pairs: u64,
    pub passed_maf: u64,
    pub passed_chisq: u64,
    pub passed_pval: u64,
}

impl PipelineSummary {
    pub fn log(&self) {
        log::info!("Processed {} total pairs. Of these:", self.total_pairs);
        log::info!("  Passed maf filter:     {}", self.passed_maf);
        log::info!("  Passed chi^2 filter:   {}", self.passed_chisq);
        log::info!("  Passed p-value filter: {}", self.passed_pval);
        if self.total_pairs > 0 && self.passed_maf == 0 {
            log::warn!("No pairs passed the allele frequency filter");
        }
    }
}

/// How far a pair got through the tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairVerdict {
    /// Chi-squared p-value at or above the cutoff
    Screened,
    Tested { significant: bool },
}

/// The statistical engine shared by every pair in a run.
#[derive(Debug, Clone)]
pub struct PairTester {
    config: PipelineConfig,
    pvals: PValueCalculator,
    fitter: LogisticFitter,
    null_model: NullModelEstimator,
}

impl PairTester {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let fitter = LogisticFitter::new(config.fit);
        Ok(Self {
            config,
            pvals: PValueCalculator::new()?,
            fitter: fitter.clone(),
            null_model: NullModelEstimator::new(fitter),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the screen on a fresh comparison and, when it passes, the logistic
    /// likelihood-ratio test. Results are written into `pair`.
    pub fn test(&self, pair: &mut PairRecord) -> Result<PairVerdict, PipelineError> {
        let chisq_p = chi_squared_test(pair, &self.pvals)?;
        if !(chisq_p < self.config.chisq_cutoff) {
            return Ok(PairVerdict::Screened);
        }

        self.fitter.fit_pair(pair)?;
        let null_ll = self.null_model.null_log_likelihood(pair)?;
        let lrt_p = likelihood_ratio_test_pair(pair, null_ll, &self.pvals)?;

        log::trace!(
            "human {} x bact {}: chisq_p={:.3e} lrt_p={:.3e} beta={:.3} [{}]",
            pair.human_line(),
            pair.bact_line(),
            chisq_p,
            lrt_p,
            pair.beta(),
            pair.comment()
        );
        Ok(PairVerdict::Tested {
            significant: lrt_p < self.config.pval_cutoff,
        })
    }
}

/// One record per bacterial variant, reused for every human variant.
pub struct PairwisePipeline {
    n_samples: usize,
    tester: PairTester,
    pairs: Vec<PairRecord>,
    summary: PipelineSummary,
}

impl PairwisePipeline {
    pub fn new(n_samples: usize, config: PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            n_samples,
            tester: PairTester::new(config)?,
            pairs: Vec::new(),
            summary: PipelineSummary::default(),
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn pairs(&self) -> &[PairRecord] {
        &self.pairs
    }

    pub fn summary(&self) -> PipelineSummary {
        self.summary
    }

    /// Adds a bacterial variant. A bad token or sample count is fatal.
    pub fn add_bacterial_variant<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        line: u64,
        covariates: Option<&Arc<Array2<f64>>>,
    ) -> Result<(), PipelineError> {
        let mut pair = PairRecord::new(self.n_samples);
        pair.add_y(tokens, line)
            .map_err(|source| PipelineError::BacterialLine { line, source })?;
        if let Some(c) = covariates {
            pair.add_covariates(Arc::clone(c))?;
        }
        self.pairs.push(pair);
        Ok(())
    }

    /// Reads every bacterial variant from `reader`. All records share `covariates`.
    pub fn load_bacterial<R: Read>(
        &mut self,
        reader: &mut VariantReader<R>,
        covariates: Option<&Arc<Array2<f64>>>,
    ) -> Result<usize, PipelineError> {
        let before = self.pairs.len();
        while let Some((line, tokens)) = reader.next_variant()? {
            self.add_bacterial_variant(&tokens, line, covariates)?;
        }
        let added = self.pairs.len() - before;
        log::info!("Read {} bacterial variants", added);
        Ok(added)
    }

    /// Tests one human variant against every bacterial variant and writes a row for
    /// each pair inside the frequency bounds. Returns the number of rows written.
    pub fn process_human_variant<S: AsRef<str>, W: Write>(
        &mut self,
        tokens: &[S],
        line: u64,
        writer: &mut Writer<W>,
    ) -> Result<usize, PipelineError> {
        let x = code_human(tokens, self.n_samples)
            .map_err(|source| PipelineError::HumanLine { line, source })?;
        let bounds = self.tester.config().bounds;

        let mut rows = 0;
        for pair in self.pairs.iter_mut() {
            self.summary.total_pairs += 1;
            pair.set_x(x.view(), line)?;
            if !bounds.retains(pair) {
                continue;
            }
            self.summary.passed_maf += 1;

            if let PairVerdict::Tested { significant } = self.tester.test(pair)? {
                self.summary.passed_chisq += 1;
                if significant {
                    self.summary.passed_pval += 1;
                }
            }

            writer.serialize(PairResult::from(&*pair))?;
            rows += 1;
        }

        self.summary.human_lines += 1;
        log::debug!("Human line {}: {} rows", line, rows);
        if self.summary.human_lines % PROGRESS_EVERY == 0 {
            log::info!(
                "Processed {} human variants ({} pairs)",
                self.summary.human_lines,
                self.summary.total_pairs
            );
        }
        Ok(rows)
    }

    /// Streams the human variants in `chunk` from `reader` through the screen.
    pub fn run<R: Read, W: Write>(
        &mut self,
        reader: &mut VariantReader<R>,
        chunk: LineChunk,
        writer: &mut Writer<W>,
    ) -> Result<PipelineSummary, PipelineError> {
        if self.pairs.is_empty() {
            log::warn!("No bacterial variants loaded; nothing to test");
        }
        if chunk.start() > 1 {
            log::info!("Skipping to chunk start: line {}", chunk.start());
        }

        while let Some((line, tokens)) = reader.next_variant()? {
            if chunk.is_past(line) {
                break;
            }
            if !chunk.contains(line) {
                continue;
            }
            self.process_human_variant(&tokens, line, writer)?;
        }
        writer.flush().map_err(IoError::from)?;
        Ok(self.summary)
    }
}
