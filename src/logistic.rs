//! Module for fitting logistic regressions by Newton-Raphson, optionally with the
//! Firth bias-reduction penalty.
use crate::pair::{PairError, PairRecord};
use crate::Penalty;
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_linalg::{Cholesky, InverseC, SVD, UPLO};
use thiserror::Error;

/// Stop when the log-likelihood improves by less than this.
pub const CONVERGENCE_LIMIT: f64 = 1e-7;
pub const MAX_NR_ITERATIONS: usize = 1000;
/// Standard errors above this flag the fit as unstable (usually separation).
pub const SE_LIMIT: f64 = 3.0;
/// Starting value for every coefficient except the intercept. Should be > 0.
pub const START_BETA: f64 = 1.0;
/// A step that lowers the log-likelihood is halved at most this many times.
const MAX_STEP_HALVINGS: usize = 5;
/// Cholesky results with a smaller (estimated) reciprocal condition number are
/// treated as failures.
const MIN_RCOND: f64 = 1e-12;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Linear algebra error: {0}")]
    LinAlg(String),
    #[error("Invalid dimensions: {0}")]
    Dimensions(String),
    #[error(transparent)]
    Pair(#[from] PairError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_iter: usize,
    pub convergence_limit: f64,
    pub start_beta: f64,
    pub se_limit: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iter: MAX_NR_ITERATIONS,
            convergence_limit: CONVERGENCE_LIMIT,
            start_beta: START_BETA,
            se_limit: SE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InversionMethod {
    Cholesky,
    PseudoInverse,
}

/// Inverse of an information matrix plus its log-determinant.
#[derive(Debug, Clone)]
pub struct Inversion {
    pub inverse: Array2<f64>,
    pub log_det: f64,
    pub method: InversionMethod,
}

/// A fitted model. Coefficient 0 is the intercept.
#[derive(Debug, Clone)]
pub struct LogitFit {
    pub coefficients: Array1<f64>,
    pub standard_errors: Array1<f64>,
    /// Penalized when the fit used the Firth penalty
    pub log_likelihood: f64,
    pub iterations: usize,
    pub inversion: InversionMethod,
}

#[derive(Debug, Clone)]
pub enum FitOutcome {
    Converged(LogitFit),
    /// Iteration limit reached; holds the best iterate found
    NonConvergent(LogitFit),
    /// The information matrix could not be inverted at the starting point
    SingularInformationMatrix,
}

impl FitOutcome {
    pub fn fit(&self) -> Option<&LogitFit> {
        match self {
            FitOutcome::Converged(f) | FitOutcome::NonConvergent(f) => Some(f),
            FitOutcome::SingularInformationMatrix => None,
        }
    }

    pub fn log_likelihood(&self) -> Option<f64> {
        self.fit().map(|f| f.log_likelihood)
    }
}

/// Inverts a symmetric positive (semi-)definite matrix.
///
/// Cholesky first; for large condition numbers that fails, and the SVD
/// pseudo-inverse is used instead, dropping singular values below
/// `max(n, p) * s_max * eps`.
pub fn invert_information(a: &Array2<f64>) -> Result<Inversion, ModelError> {
    if let Ok(l) = a.cholesky(UPLO::Lower) {
        let (lo, hi) = l
            .diag()
            .iter()
            .fold((f64::INFINITY, 0.0f64), |(lo, hi), &d| (lo.min(d), hi.max(d)));
        if hi > 0.0 && (lo / hi).powi(2) > MIN_RCOND {
            if let Ok(inverse) = a.invc() {
                let log_det = 2.0 * l.diag().mapv(f64::ln).sum();
                return Ok(Inversion { inverse, log_det, method: InversionMethod::Cholesky });
            }
        }
    }

    log::debug!("Cholesky inversion failed, using pseudo-inverse");
    let (u, sigma, vt) = a
        .svd(true, true)
        .map_err(|e| ModelError::LinAlg(e.to_string()))?;
    let u = u.ok_or_else(|| ModelError::LinAlg("SVD returned no U".into()))?;
    let vt = vt.ok_or_else(|| ModelError::LinAlg("SVD returned no V^T".into()))?;

    let s_max = sigma.iter().cloned().fold(0.0, f64::max);
    let tol = a.nrows().max(a.ncols()) as f64 * s_max * f64::EPSILON;
    if !(s_max > 0.0) {
        return Err(ModelError::LinAlg("matrix has no non-zero singular values".into()));
    }

    // pinv = V * S^-1 * U^T over the retained singular values
    let mut v_scaled = vt.t().to_owned();
    let mut log_det = 0.0;
    for (j, mut col) in v_scaled.axis_iter_mut(Axis(1)).enumerate() {
        if sigma[j] > tol {
            col /= sigma[j];
            log_det += sigma[j].ln();
        } else {
            col.fill(0.0);
        }
    }
    let inverse = v_scaled.dot(&u.t());

    Ok(Inversion { inverse, log_det, method: InversionMethod::PseudoInverse })
}

/// Quantities at one coefficient vector.
struct Evaluation {
    beta: Array1<f64>,
    log_likelihood: f64,
    score: Array1<f64>,
    inversion: Inversion,
}

/// Newton-Raphson logistic regression of a 0/1 response on a design matrix.
#[derive(Debug, Clone, Default)]
pub struct LogisticFitter {
    options: FitOptions,
}

impl LogisticFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Fits `y ~ 1 + predictors`. The intercept column is added here.
    ///
    /// `start` overrides the default starting coefficients (intercept at the
    /// empirical log-odds, the rest at `start_beta`) and must include the intercept.
    pub fn fit(
        &self,
        predictors: ArrayView2<f64>,
        y: &Array1<f64>,
        penalty: Penalty,
        start: Option<&Array1<f64>>,
    ) -> Result<FitOutcome, ModelError> {
        let design = with_intercept(predictors);
        let (n, p) = design.dim();
        if y.len() != n {
            return Err(ModelError::Dimensions(format!(
                "response has {} samples but design matrix has {} rows",
                y.len(),
                n
            )));
        }

        let beta0 = match start {
            Some(b) if b.len() == p => b.clone(),
            Some(b) => {
                return Err(ModelError::Dimensions(format!(
                    "{} start coefficients for {} columns",
                    b.len(),
                    p
                )))
            }
            None => self.default_start(y, p),
        };

        let mut current = match evaluate(&design, y, beta0, penalty) {
            Some(eval) => eval,
            None => return Ok(FitOutcome::SingularInformationMatrix),
        };

        let mut converged = false;
        let mut iterations = 0;
        while iterations < self.options.max_iter {
            iterations += 1;
            let step = current.inversion.inverse.dot(&current.score);

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..=MAX_STEP_HALVINGS {
                let candidate = &current.beta + &(&step * scale);
                if let Some(eval) = evaluate(&design, y, candidate, penalty) {
                    if eval.log_likelihood >= current.log_likelihood {
                        accepted = Some(eval);
                        break;
                    }
                }
                scale *= 0.5;
            }

            match accepted {
                Some(eval) => {
                    let improvement = eval.log_likelihood - current.log_likelihood;
                    current = eval;
                    if improvement < self.options.convergence_limit {
                        converged = true;
                        break;
                    }
                }
                // No step along the Newton direction helps: already at the optimum
                None => {
                    converged = true;
                    break;
                }
            }
        }

        let standard_errors = current
            .inversion
            .inverse
            .diag()
            .mapv(|v| if v >= 0.0 { v.sqrt() } else { f64::NAN });
        let fit = LogitFit {
            coefficients: current.beta,
            standard_errors,
            log_likelihood: current.log_likelihood,
            iterations,
            inversion: current.inversion.method,
        };

        log::trace!(
            "logistic fit ({:?}): {} iterations, ll={:.6}, converged={}",
            penalty,
            iterations,
            fit.log_likelihood,
            converged
        );

        if converged {
            Ok(FitOutcome::Converged(fit))
        } else {
            Ok(FitOutcome::NonConvergent(fit))
        }
    }

    /// Fits the alternative model for the record's current comparison and writes
    /// the result back. Refits start from the record's current coefficients.
    pub fn fit_pair(&self, pair: &mut PairRecord) -> Result<FitOutcome, ModelError> {
        let design = pair.design_matrix();
        let start = pair.coefficients().cloned();
        let outcome = self.fit(design.view(), pair.y(), pair.penalty(), start.as_ref())?;

        match &outcome {
            FitOutcome::Converged(fit) | FitOutcome::NonConvergent(fit) => {
                if matches!(outcome, FitOutcome::NonConvergent(_)) {
                    pair.add_comment("max-iter");
                }
                // Negated so that NaN standard errors are flagged too
                if fit.standard_errors.iter().any(|se| !(*se <= self.options.se_limit)) {
                    pair.add_comment("large-se");
                }
                pair.record_fit(fit.coefficients.clone(), &fit.standard_errors, fit.log_likelihood)?;
            }
            FitOutcome::SingularInformationMatrix => {
                pair.add_comment("singular-info");
                pair.record_failed_fit()?;
            }
        }
        Ok(outcome)
    }

    fn default_start(&self, y: &Array1<f64>, p: usize) -> Array1<f64> {
        let n = y.len().max(1) as f64;
        let floor = 0.5 / n;
        let mean = (y.sum() / n).clamp(floor, 1.0 - floor);

        let mut beta = Array1::from_elem(p, self.options.start_beta);
        beta[0] = (mean / (1.0 - mean)).ln();
        beta
    }
}

/// Prepends a column of ones.
pub fn with_intercept(predictors: ArrayView2<f64>) -> Array2<f64> {
    let (n, k) = predictors.dim();
    let mut design = Array2::ones((n, k + 1));
    design.slice_mut(s![.., 1..]).assign(&predictors);
    design
}

/// Unpenalized binomial log-likelihood at `beta`.
pub fn log_likelihood(design: &Array2<f64>, y: &Array1<f64>, beta: &Array1<f64>) -> f64 {
    let eta = design.dot(beta);
    y.iter()
        .zip(eta.iter())
        .map(|(&yi, &e)| yi * e - softplus(e))
        .sum()
}

/// Score, information and (penalized) log-likelihood at `beta`. `None` when the
/// information matrix cannot be inverted or the likelihood is not finite.
fn evaluate(design: &Array2<f64>, y: &Array1<f64>, beta: Array1<f64>, penalty: Penalty) -> Option<Evaluation> {
    let eta = design.dot(&beta);
    let mu = eta.mapv(sigmoid);
    let w = mu.mapv(|m| m * (1.0 - m));

    // I = X^T W X
    let xw = design * &w.view().insert_axis(Axis(1));
    let info = design.t().dot(&xw);

    let inversion = match invert_information(&info) {
        Ok(inv) => inv,
        Err(e) => {
            log::trace!("information matrix not invertible: {}", e);
            return None;
        }
    };

    let mut ll = log_likelihood(design, y, &beta);
    let mut residual = y - &mu;

    if penalty == Penalty::Firth {
        // h_i = w_i * x_i^T I^-1 x_i
        let x_inv = design.dot(&inversion.inverse);
        let h = (&x_inv * design).sum_axis(Axis(1)) * &w;
        residual = residual + &h * &mu.mapv(|m| 0.5 - m);
        ll += 0.5 * inversion.log_det;
    }

    if !ll.is_finite() {
        return None;
    }

    let score = design.t().dot(&residual);
    Some(Evaluation { beta, log_likelihood: ll, score, inversion })
}

fn sigmoid(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// ln(1 + e^x) without overflow.
fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}
