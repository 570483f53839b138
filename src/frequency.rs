//! Module for the allele-frequency gate applied before any test is run.
use crate::pair::PairRecord;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FrequencyError {
    #[error("Invalid frequency bounds [{min_af}, {max_af}]: need 0 <= min <= max <= 1")]
    InvalidBounds { min_af: f64, max_af: f64 },
}

pub const DEFAULT_MIN_AF: f64 = 0.01;
pub const DEFAULT_MAX_AF: f64 = 0.99;

/// Inclusive `[min_af, max_af]` window that both sides of a pair must fall in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBounds {
    min_af: f64,
    max_af: f64,
}

impl FrequencyBounds {
    pub fn new(min_af: f64, max_af: f64) -> Result<Self, FrequencyError> {
        // Written so that NaN bounds are rejected too
        if !(0.0..=1.0).contains(&min_af) || !(0.0..=1.0).contains(&max_af) || min_af > max_af {
            return Err(FrequencyError::InvalidBounds { min_af, max_af });
        }
        Ok(Self { min_af, max_af })
    }

    /// Symmetric bounds `[maf, 1 - maf]`.
    pub fn symmetric(maf: f64) -> Result<Self, FrequencyError> {
        Self::new(maf, 1.0 - maf)
    }

    pub fn min_af(&self) -> f64 {
        self.min_af
    }

    pub fn max_af(&self) -> f64 {
        self.max_af
    }

    pub fn contains(&self, af: f64) -> bool {
        af >= self.min_af && af <= self.max_af
    }

    /// True when both the human and the bacterial frequency are inside the bounds.
    pub fn retains(&self, pair: &PairRecord) -> bool {
        let (maf_x, maf_y) = pair.maf();
        self.contains(maf_x) && self.contains(maf_y)
    }
}

impl Default for FrequencyBounds {
    fn default() -> Self {
        Self {
            min_af: DEFAULT_MIN_AF,
            max_af: DEFAULT_MAX_AF,
        }
    }
}
