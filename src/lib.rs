//! # epistasis-rust
//!
//! Pairwise association screen between human and bacterial variants.
//!
//! Every bacterial variant is held as a [`pair::PairRecord`]. Each human variant is
//! injected into every record in turn, screened with a Yates-corrected chi-squared
//! test and, when the screen passes, tested with a covariate-adjusted logistic
//! likelihood-ratio test. The binaries `epistasis` and `plan-chunks` call into this
//! library.

pub mod association;
pub mod chisq;
pub mod chunk;
pub mod frequency;
pub mod genotype;
pub mod io;
pub mod logistic;
pub mod lrt;
pub mod null_model;
pub mod pair;
pub mod pvalue;

pub use association::{PairwisePipeline, PipelineConfig, PipelineError, PipelineSummary};
pub use chunk::LineChunk;
pub use pair::PairRecord;

/// Likelihood used by a logistic fit.
///
/// Sparse contingency tables switch a comparison to the Firth-penalized
/// likelihood, `ll + 0.5 * log det I`. The discriminant indexes per-penalty caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Penalty {
    None = 0,
    Firth = 1,
}

impl Penalty {
    pub fn from_firth_flag(firth: bool) -> Self {
        if firth {
            Penalty::Firth
        } else {
            Penalty::None
        }
    }
}
