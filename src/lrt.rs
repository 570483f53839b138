//! Module for the likelihood-ratio test between the alternative and null fits.
use crate::pair::{PairError, PairRecord};
use crate::pvalue::PValueCalculator;

/// Result of comparing two log-likelihoods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrtOutcome {
    pub p_value: f64,
    /// `sqrt(2 * (ll_alt - ll_null))` when the deviance was positive
    pub statistic: Option<f64>,
    pub diagnostic: Option<&'static str>,
}

/// Tests the alternative against the null log-likelihood.
///
/// A missing fit, or a log-likelihood of exactly zero, is treated as "never fit"
/// and gives p = 1. A non-positive deviance means the alternative converged worse
/// than the null and also gives p = 1.
pub fn likelihood_ratio_test(
    alt_ll: Option<f64>,
    null_ll: Option<f64>,
    pvals: &PValueCalculator,
) -> LrtOutcome {
    let (alt, null) = match (alt_ll, null_ll) {
        (Some(a), Some(n)) if a != 0.0 && n != 0.0 => (a, n),
        _ => {
            return LrtOutcome { p_value: 1.0, statistic: None, diagnostic: Some("zero-ll") };
        }
    };

    let deviance = 2.0 * (alt - null);
    if !(deviance > 0.0) {
        return LrtOutcome { p_value: 1.0, statistic: None, diagnostic: Some("lrt-nonpositive") };
    }

    let z = deviance.sqrt();
    LrtOutcome { p_value: pvals.normal_pval(z), statistic: Some(z), diagnostic: None }
}

/// Runs the test on a fitted record against `null_ll` and writes the p-value back.
pub fn likelihood_ratio_test_pair(
    pair: &mut PairRecord,
    null_ll: Option<f64>,
    pvals: &PValueCalculator,
) -> Result<f64, PairError> {
    let outcome = likelihood_ratio_test(pair.log_likelihood(), null_ll, pvals);
    if let Some(diagnostic) = outcome.diagnostic {
        pair.add_comment(diagnostic);
    }
    pair.record_lrt(null_ll, outcome.p_value)?;
    Ok(outcome.p_value)
}
