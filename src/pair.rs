//! Module for the per-comparison record: one bacterial variant tested against the
//! current human variant.
use crate::genotype::{code_bacterial, code_human, GenotypeError};
use crate::Penalty;
use ndarray::{s, Array1, Array2, ArrayView1};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PairError {
    #[error(transparent)]
    Genotype(#[from] GenotypeError),
    #[error("Covariates have {found} rows but there are {expected} samples")]
    CovariateRows { expected: usize, found: usize },
    #[error("Cannot record {action} while the pair is {stage:?}")]
    Stage {
        action: &'static str,
        stage: PairStage,
    },
}

/// Where a comparison is in the screen -> fit -> test sequence.
///
/// Injecting a new human variant always returns the record to `Fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairStage {
    Fresh,
    Screened,
    Fit,
    Tested,
}

/// Statistics belonging to the current comparison. Replaced wholesale on reset.
#[derive(Debug, Clone, PartialEq)]
struct PairStats {
    chisq_p: f64,
    lrt_p: f64,
    log_likelihood: Option<f64>,
    null_log_likelihood: Option<f64>,
    coefficients: Option<Array1<f64>>,
    beta: f64,
    se: f64,
    firth: bool,
    comment: String,
}

impl Default for PairStats {
    fn default() -> Self {
        Self {
            chisq_p: 1.0,
            lrt_p: 1.0,
            log_likelihood: None,
            null_log_likelihood: None,
            coefficients: None,
            beta: 0.0,
            se: 0.0,
            firth: false,
            comment: PairRecord::NO_COMMENT.to_string(),
        }
    }
}

/// One bacterial variant and the state of its comparison with the current human
/// variant.
#[derive(Debug, Clone)]
pub struct PairRecord {
    n_samples: usize,
    bact_line: u64,
    human_line: u64,
    x: Array1<f64>,
    y: Array1<f64>,
    // One matrix shared by every record of a run
    covariates: Option<Arc<Array2<f64>>>,
    maf_x: f64,
    maf_y: f64,
    stage: PairStage,
    stats: PairStats,
    // Indexed by `Penalty as usize`; depends only on y and the covariates
    null_cache: [Option<Option<f64>>; 2],
}

impl PairRecord {
    /// Value of the comments column when nothing went wrong.
    pub const NO_COMMENT: &'static str = "NA";

    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            bact_line: 0,
            human_line: 0,
            x: Array1::zeros(n_samples),
            y: Array1::zeros(n_samples),
            covariates: None,
            maf_x: 0.0,
            maf_y: 0.0,
            stage: PairStage::Fresh,
            stats: PairStats::default(),
            null_cache: [None, None],
        }
    }

    // ---------------------------------------------------------------
    // Inputs
    // ---------------------------------------------------------------

    /// Codes and sets the human variant, starting a new comparison.
    pub fn add_x<S: AsRef<str>>(&mut self, tokens: &[S], human_line: u64) -> Result<(), PairError> {
        let x = code_human(tokens, self.n_samples)?;
        self.set_x(x.view(), human_line)
    }

    /// Sets an already-coded human variant, starting a new comparison.
    pub fn set_x(&mut self, x: ArrayView1<f64>, human_line: u64) -> Result<(), PairError> {
        if x.len() != self.n_samples {
            return Err(GenotypeError::SampleCount {
                side: "human",
                expected: self.n_samples,
                found: x.len(),
            }
            .into());
        }
        self.x.assign(&x);
        self.maf_x = allele_mean(&self.x);
        self.human_line = human_line;
        self.reset_stats();
        Ok(())
    }

    /// Codes and sets the bacterial variant.
    pub fn add_y<S: AsRef<str>>(&mut self, tokens: &[S], bact_line: u64) -> Result<(), PairError> {
        self.y = code_bacterial(tokens, self.n_samples)?;
        self.maf_y = allele_mean(&self.y);
        self.bact_line = bact_line;
        self.null_cache = [None, None];
        self.reset_stats();
        Ok(())
    }

    /// Attaches the covariate matrix. Pass an `Arc` to share one matrix across
    /// records.
    pub fn add_covariates<C>(&mut self, covariates: C) -> Result<(), PairError>
    where
        C: Into<Arc<Array2<f64>>>,
    {
        let covariates = covariates.into();
        if covariates.nrows() != self.n_samples {
            return Err(PairError::CovariateRows {
                expected: self.n_samples,
                found: covariates.nrows(),
            });
        }
        self.covariates = Some(covariates);
        self.null_cache = [None, None];
        self.reset_stats();
        Ok(())
    }

    /// Returns all comparison statistics to their defaults and the stage to `Fresh`.
    pub fn reset_stats(&mut self) {
        self.stats = PairStats::default();
        self.stage = PairStage::Fresh;
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn bact_line(&self) -> u64 {
        self.bact_line
    }

    pub fn human_line(&self) -> u64 {
        self.human_line
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn covariates(&self) -> Option<&Array2<f64>> {
        self.covariates.as_deref()
    }

    /// (human, bacterial) allele frequencies.
    pub fn maf(&self) -> (f64, f64) {
        (self.maf_x, self.maf_y)
    }

    pub fn stage(&self) -> PairStage {
        self.stage
    }

    pub fn chisq_p(&self) -> f64 {
        self.stats.chisq_p
    }

    pub fn lrt_p(&self) -> f64 {
        self.stats.lrt_p
    }

    /// Maximized (penalized, for Firth pairs) log-likelihood; `None` until a fit is
    /// recorded.
    pub fn log_likelihood(&self) -> Option<f64> {
        self.stats.log_likelihood
    }

    pub fn null_log_likelihood(&self) -> Option<f64> {
        self.stats.null_log_likelihood
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.stats.coefficients.as_ref()
    }

    pub fn beta(&self) -> f64 {
        self.stats.beta
    }

    pub fn standard_error(&self) -> f64 {
        self.stats.se
    }

    pub fn firth(&self) -> bool {
        self.stats.firth
    }

    pub fn penalty(&self) -> Penalty {
        Penalty::from_firth_flag(self.stats.firth)
    }

    pub fn comment(&self) -> &str {
        &self.stats.comment
    }

    /// Genetic column followed by any covariate columns. No intercept.
    pub fn design_matrix(&self) -> Array2<f64> {
        let n_covars = self.covariates.as_ref().map_or(0, |c| c.ncols());
        let mut design = Array2::zeros((self.n_samples, n_covars + 1));
        design.column_mut(0).assign(&self.x);
        if let Some(c) = self.covariates.as_deref() {
            design.slice_mut(s![.., 1..]).assign(c);
        }
        design
    }

    /// Covariate columns only, `n x 0` when there are none.
    pub fn null_design_matrix(&self) -> Array2<f64> {
        match self.covariates.as_deref() {
            Some(c) => c.clone(),
            None => Array2::zeros((self.n_samples, 0)),
        }
    }

    // ---------------------------------------------------------------
    // Results
    // ---------------------------------------------------------------

    pub fn add_comment(&mut self, new_comment: &str) {
        if self.stats.comment == Self::NO_COMMENT {
            self.stats.comment = new_comment.to_string();
        } else {
            self.stats.comment.push(',');
            self.stats.comment.push_str(new_comment);
        }
    }

    /// Marks the comparison as needing a Firth fit. Cleared only by a reset.
    pub fn set_firth(&mut self) {
        self.stats.firth = true;
    }

    pub fn record_chisq(&mut self, p_value: f64) -> Result<(), PairError> {
        self.require("chi-squared result", &[PairStage::Fresh])?;
        self.stats.chisq_p = p_value;
        self.stage = PairStage::Screened;
        Ok(())
    }

    /// Stores a logistic fit. `coefficients[1]` is the genetic effect.
    pub fn record_fit(
        &mut self,
        coefficients: Array1<f64>,
        standard_errors: &Array1<f64>,
        log_likelihood: f64,
    ) -> Result<(), PairError> {
        self.require("logistic fit", &[PairStage::Screened, PairStage::Fit])?;
        self.stats.beta = coefficients.get(1).copied().unwrap_or(0.0);
        self.stats.se = standard_errors.get(1).copied().unwrap_or(0.0);
        self.stats.coefficients = Some(coefficients);
        self.stats.log_likelihood = Some(log_likelihood);
        self.stage = PairStage::Fit;
        Ok(())
    }

    /// Moves past the fit stage without a usable fit (singular information matrix).
    pub fn record_failed_fit(&mut self) -> Result<(), PairError> {
        self.require("failed fit", &[PairStage::Screened, PairStage::Fit])?;
        self.stats.coefficients = None;
        self.stats.log_likelihood = None;
        self.stats.beta = 0.0;
        self.stats.se = 0.0;
        self.stage = PairStage::Fit;
        Ok(())
    }

    pub fn record_lrt(&mut self, null_log_likelihood: Option<f64>, p_value: f64) -> Result<(), PairError> {
        self.require("likelihood-ratio test", &[PairStage::Fit])?;
        self.stats.null_log_likelihood = null_log_likelihood;
        self.stats.lrt_p = p_value;
        self.stage = PairStage::Tested;
        Ok(())
    }

    pub(crate) fn cached_null(&self, penalty: Penalty) -> Option<Option<f64>> {
        self.null_cache[penalty as usize]
    }

    pub(crate) fn cache_null(&mut self, penalty: Penalty, log_likelihood: Option<f64>) {
        self.null_cache[penalty as usize] = Some(log_likelihood);
    }

    fn require(&self, action: &'static str, allowed: &[PairStage]) -> Result<(), PairError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(PairError::Stage { action, stage: self.stage })
        }
    }
}

/// `sum / length`: the dosage mean, used as the allele frequency on both sides.
pub fn allele_mean(v: &Array1<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.sum() / v.len() as f64
}
