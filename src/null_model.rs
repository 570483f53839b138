//! Module for the covariate-only (no genetic term) logistic fit that provides the
//! baseline log-likelihood for the likelihood-ratio test.
use crate::logistic::{FitOutcome, LogisticFitter, ModelError};
use crate::pair::PairRecord;
use crate::Penalty;
use ndarray::{Array1, ArrayView2};

/// Fits `y ~ 1 [+ covariates]` with the same Newton-Raphson, convergence and
/// inversion policy as the alternative model.
#[derive(Debug, Clone, Default)]
pub struct NullModelEstimator {
    fitter: LogisticFitter,
}

impl NullModelEstimator {
    pub fn new(fitter: LogisticFitter) -> Self {
        Self { fitter }
    }

    /// Null log-likelihood, or `None` when the information matrix is singular.
    pub fn fit(
        &self,
        covariates: ArrayView2<f64>,
        y: &Array1<f64>,
        penalty: Penalty,
    ) -> Result<Option<f64>, ModelError> {
        let outcome = self.fitter.fit(covariates, y, penalty, None)?;
        match &outcome {
            FitOutcome::NonConvergent(fit) => {
                log::debug!(
                    "null model did not converge after {} iterations, using best ll={:.6}",
                    fit.iterations,
                    fit.log_likelihood
                );
            }
            FitOutcome::SingularInformationMatrix => {
                log::debug!("null model information matrix is singular");
            }
            FitOutcome::Converged(_) => {}
        }
        Ok(outcome.log_likelihood())
    }

    /// Null log-likelihood for the record's bacterial variant under the penalty the
    /// current comparison uses. Cached on the record until `y` or the covariates
    /// change.
    pub fn null_log_likelihood(&self, pair: &mut PairRecord) -> Result<Option<f64>, ModelError> {
        let penalty = pair.penalty();
        if let Some(cached) = pair.cached_null(penalty) {
            return Ok(cached);
        }

        let covariates = pair.null_design_matrix();
        let ll = self.fit(covariates.view(), pair.y(), penalty)?;
        log::trace!(
            "null model for bacterial line {} ({:?}): {:?}",
            pair.bact_line(),
            penalty,
            ll
        );
        pair.cache_null(penalty, ll);
        Ok(ll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_intercept_only_null_is_binomial_ll() {
        let y = array![1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let ll = NullModelEstimator::default()
            .fit(Array2::zeros((10, 0)).view(), &y, Penalty::None)
            .unwrap()
            .unwrap();
        let expected = 4.0 * 0.4f64.ln() + 6.0 * 0.6f64.ln();
        assert_relative_eq!(ll, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_covariates_improve_null() {
        let y = array![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let covars = array![[0.1], [0.3], [0.9], [0.2], [0.8], [0.4], [0.6], [0.7]];
        let est = NullModelEstimator::default();
        let base = est.fit(Array2::zeros((8, 0)).view(), &y, Penalty::None).unwrap().unwrap();
        let adjusted = est.fit(covars.view(), &y, Penalty::None).unwrap().unwrap();
        assert!(adjusted > base, "adjusted={} base={}", adjusted, base);
    }

    #[test]
    fn test_null_is_cached_per_bacterial_variant() {
        let mut pair = PairRecord::new(6);
        pair.add_y(&["1", "0", "1", "1", "0", "0"], 1).unwrap();
        pair.add_x(&["0/0", "0/1", "1/1", "0/1", "0/0", "0/0"], 1).unwrap();

        let est = NullModelEstimator::default();
        let ll = est.null_log_likelihood(&mut pair).unwrap();
        assert_relative_eq!(ll.unwrap(), 6.0 * 0.5f64.ln(), epsilon = 1e-9);
        assert_eq!(pair.cached_null(Penalty::None), Some(ll));

        // A new human variant reuses the cached value
        pair.add_x(&["0/1", "0/1", "1/1", "0/1", "0/0", "0/0"], 2).unwrap();
        assert_eq!(pair.cached_null(Penalty::None), Some(ll));
    }

    #[test]
    fn test_firth_null_is_penalized() {
        let y = array![1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let est = NullModelEstimator::default();
        let plain = est.fit(Array2::zeros((6, 0)).view(), &y, Penalty::None).unwrap().unwrap();
        let firth = est.fit(Array2::zeros((6, 0)).view(), &y, Penalty::Firth).unwrap().unwrap();
        assert!(firth != plain);
        assert!(firth.is_finite());
    }
}
