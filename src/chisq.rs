//! Module for the 2x3 contingency-table screen (Yates-corrected chi-squared).
use crate::pair::{PairError, PairRecord};
use crate::pvalue::PValueCalculator;
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ScreenError {
    #[error("Empty table for chi-squared test")]
    EmptyTable,
    #[error(transparent)]
    Pair(#[from] PairError),
}

/// Contingency table of bacterial status (rows: absent, present) against human
/// dosage (columns: 0, 1, 2).
///
/// ```text
///          human 0   human 1   human 2
/// bact 0   a         b         c
/// bact 1   d         e         f
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    counts: Array2<f64>,
}

/// Result of screening one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOutcome {
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
    /// χ² tail underflowed and the normal bound on sqrt(statistic) was used
    pub chi_large: bool,
    /// Sparse cells: the logistic fit should use the Firth penalty
    pub needs_firth: bool,
}

impl ContingencyTable {
    /// Counts `(a, b, c)` for bacteria absent and `(d, e, f)` for present.
    pub fn from_counts(absent: [f64; 3], present: [f64; 3]) -> Self {
        let mut counts = Array2::zeros((2, 3));
        counts.row_mut(0).assign(&Array1::from(absent.to_vec()));
        counts.row_mut(1).assign(&Array1::from(present.to_vec()));
        Self { counts }
    }

    /// Tallies samples by (bacterial presence, human dosage).
    pub fn from_genotypes(x: &Array1<f64>, y: &Array1<f64>) -> Self {
        let mut counts = Array2::zeros((2, 3));
        for (&dosage, &present) in x.iter().zip(y.iter()) {
            let row = if present == 0.0 { 0 } else { 1 };
            let col = if dosage == 0.0 {
                0
            } else if dosage == 1.0 {
                1
            } else {
                2
            };
            counts[[row, col]] += 1.0;
        }
        Self { counts }
    }

    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// Any cell at 0 or 1, or more than two cells at 5 or fewer.
    pub fn needs_firth(&self) -> bool {
        let mut low_obs = 0;
        for &obs in self.counts.iter() {
            if obs <= 1.0 {
                return true;
            }
            if obs <= 5.0 {
                low_obs += 1;
            }
        }
        low_obs > 2
    }

    /// Yates-corrected statistic and its degrees of freedom.
    ///
    /// Cells in an empty row or column have no expected count and are left out; the
    /// degrees of freedom shrink accordingly, so a table with an empty human dosage
    /// class is tested as 2x2.
    pub fn yates_statistic(&self) -> Result<(f64, usize), ScreenError> {
        let total = self.total();
        if total == 0.0 {
            return Err(ScreenError::EmptyTable);
        }

        let row_sum = self.counts.sum_axis(Axis(1));
        let col_sum = self.counts.sum_axis(Axis(0));

        let mut chisq = 0.0;
        for ((i, j), &observed) in self.counts.indexed_iter() {
            let expected = row_sum[i] * col_sum[j] / total;
            if expected > 0.0 {
                chisq += ((observed - expected).abs() - 0.5).powi(2) / expected;
            }
        }

        let rows = row_sum.iter().filter(|&&s| s > 0.0).count();
        let cols = col_sum.iter().filter(|&&s| s > 0.0).count();
        let df = rows.saturating_sub(1) * cols.saturating_sub(1);
        if df == 0 {
            return Ok((0.0, 0));
        }
        Ok((chisq, df))
    }

    /// Chi-squared p-value of the table, with the normal bound standing in when
    /// the tail underflows to zero.
    ///
    /// A full 2x3 table is always tested on 2 degrees of freedom; only empty rows
    /// or columns reduce them.
    pub fn screen(&self, pvals: &PValueCalculator) -> Result<ScreenOutcome, ScreenError> {
        let (statistic, df) = self.yates_statistic()?;
        let mut p_value = pvals.chi_squared_pval(statistic, df);

        let chi_large = p_value == 0.0;
        if chi_large {
            p_value = pvals.normal_pval(statistic.sqrt());
        }

        log::trace!(
            "table {:?}: chisq={:.4} df={} p={:.3e}",
            self.counts.as_slice(),
            statistic,
            df,
            p_value
        );

        Ok(ScreenOutcome {
            statistic,
            df,
            p_value,
            chi_large,
            needs_firth: self.needs_firth(),
        })
    }
}

/// Screens the record's current comparison and writes the p-value, the Firth flag
/// and any diagnostics back into it.
pub fn chi_squared_test(pair: &mut PairRecord, pvals: &PValueCalculator) -> Result<f64, ScreenError> {
    let table = ContingencyTable::from_genotypes(pair.x(), pair.y());
    let outcome = table.screen(pvals)?;

    if outcome.needs_firth {
        pair.add_comment("bad-chisq");
        pair.set_firth();
    }
    if outcome.chi_large {
        pair.add_comment("chi-large");
    }
    pair.record_chisq(outcome.p_value)?;
    Ok(outcome.p_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn calc() -> PValueCalculator {
        PValueCalculator::new().unwrap()
    }

    /// Expands a table back into per-sample genotype vectors.
    fn genotypes(absent: [usize; 3], present: [usize; 3]) -> (Array1<f64>, Array1<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (bact, row) in [(0.0, absent), (1.0, present)] {
            for (dosage, &n) in row.iter().enumerate() {
                for _ in 0..n {
                    x.push(dosage as f64);
                    y.push(bact);
                }
            }
        }
        (Array1::from(x), Array1::from(y))
    }

    #[test]
    fn test_from_genotypes_counts() {
        let (x, y) = genotypes([10, 5, 2], [8, 6, 3]);
        let table = ContingencyTable::from_genotypes(&x, &y);
        assert_eq!(
            table,
            ContingencyTable::from_counts([10.0, 5.0, 2.0], [8.0, 6.0, 3.0])
        );
        assert_eq!(table.total(), 34.0);
    }

    #[test]
    fn test_golden_table() {
        // Row sums (17, 17), column sums (18, 11, 5), N = 34.
        // Expected: 9, 5.5, 2.5 in both rows. Only the dosage-0 cells are more
        // than 0.5 from expectation, each contributing 0.5^2 / 9.
        let table = ContingencyTable::from_counts([10.0, 5.0, 2.0], [8.0, 6.0, 3.0]);
        let (stat, df) = table.yates_statistic().unwrap();
        assert_eq!(df, 2);
        assert_relative_eq!(stat, 1.0 / 18.0, epsilon = 1e-12);

        let outcome = table.screen(&calc()).unwrap();
        assert_relative_eq!(outcome.p_value, (-1.0f64 / 36.0).exp(), epsilon = 1e-10);
        assert!(!outcome.chi_large);
        // Three cells <= 5
        assert!(outcome.needs_firth);
    }

    #[test]
    fn test_empty_table_is_error() {
        let table = ContingencyTable::from_counts([0.0; 3], [0.0; 3]);
        assert_eq!(table.yates_statistic(), Err(ScreenError::EmptyTable));
    }

    #[test]
    fn test_firth_trigger_rules() {
        // Single cell <= 1
        assert!(ContingencyTable::from_counts([1.0, 20.0, 20.0], [20.0, 20.0, 20.0]).needs_firth());
        // Exactly two cells <= 5: no trigger
        assert!(!ContingencyTable::from_counts([5.0, 4.0, 20.0], [20.0, 20.0, 20.0]).needs_firth());
        // Three cells <= 5
        assert!(ContingencyTable::from_counts([5.0, 4.0, 3.0], [20.0, 20.0, 20.0]).needs_firth());
        // Nothing sparse
        assert!(!ContingencyTable::from_counts([10.0, 12.0, 6.0], [9.0, 14.0, 7.0]).needs_firth());
    }

    #[test]
    fn test_full_table_keeps_two_df() {
        // A nearly empty dosage class still counts as a column
        let table = ContingencyTable::from_counts([40.0, 30.0, 1.0], [30.0, 40.0, 1.0]);
        let outcome = table.screen(&calc()).unwrap();
        assert_eq!(outcome.df, 2);
        assert_relative_eq!(
            outcome.p_value,
            calc().chi_squared_pval(outcome.statistic, 2),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_empty_column_drops_to_one_df() {
        // Nobody homozygous for the human alt allele
        let table = ContingencyTable::from_counts([30.0, 10.0, 0.0], [10.0, 30.0, 0.0]);
        let (stat, df) = table.yates_statistic().unwrap();
        assert_eq!(df, 1);
        assert!(stat.is_finite() && stat > 0.0);
        let outcome = table.screen(&calc()).unwrap();
        assert!(outcome.p_value > 0.0 && outcome.p_value < 1e-3);
    }

    #[test]
    fn test_single_row_has_nothing_to_test() {
        let table = ContingencyTable::from_counts([10.0, 10.0, 10.0], [0.0; 3]);
        let outcome = table.screen(&calc()).unwrap();
        assert_eq!(outcome.df, 0);
        assert_eq!(outcome.p_value, 1.0);
    }

    #[test]
    fn test_huge_statistic_uses_normal_bound() {
        let table = ContingencyTable::from_counts([5000.0, 0.0, 0.0], [0.0, 5000.0, 0.0]);
        let outcome = table.screen(&calc()).unwrap();
        assert!(outcome.chi_large);
        assert!(outcome.p_value >= 0.0 && outcome.p_value < 1e-300);
    }

    /// Record holding the comparison behind a table.
    fn pair_from_table(absent: [usize; 3], present: [usize; 3]) -> PairRecord {
        let (x, y) = genotypes(absent, present);
        let mut pair = PairRecord::new(x.len());
        let y_tokens: Vec<String> = y.iter().map(|v| format!("{}", *v as u8)).collect();
        let x_tokens: Vec<&str> = x
            .iter()
            .map(|v| match *v as u8 {
                0 => "0/0",
                1 => "0/1",
                _ => "1/1",
            })
            .collect();
        pair.add_y(&y_tokens, 1).unwrap();
        pair.add_x(&x_tokens, 1).unwrap();
        pair
    }

    #[test]
    fn test_chi_squared_test_writes_back() {
        let mut pair = pair_from_table([10, 5, 2], [8, 6, 3]);

        let p = chi_squared_test(&mut pair, &calc()).unwrap();
        assert_relative_eq!(p, (-1.0f64 / 36.0).exp(), epsilon = 1e-10);
        assert_relative_eq!(pair.chisq_p(), p);
        assert!(pair.firth());
        assert_eq!(pair.comment(), "bad-chisq");
        assert_eq!(pair.stage(), crate::pair::PairStage::Screened);
    }

    #[test]
    fn test_chi_squared_test_flags_chi_large() {
        // No sparse cells, so only the underflow is annotated
        let mut pair = pair_from_table([5000, 10, 10], [10, 5000, 10]);
        let p = chi_squared_test(&mut pair, &calc()).unwrap();
        assert!(p >= 0.0 && p < 1e-300);
        assert!(!pair.firth());
        assert_eq!(pair.comment(), "chi-large");
        assert_eq!(pair.stage(), crate::pair::PairStage::Screened);
    }

    #[test]
    fn test_chi_squared_test_flags_sparse_and_large() {
        let mut pair = pair_from_table([5000, 0, 0], [0, 5000, 0]);
        chi_squared_test(&mut pair, &calc()).unwrap();
        assert!(pair.firth());
        assert_eq!(pair.comment(), "bad-chisq,chi-large");
    }
}
