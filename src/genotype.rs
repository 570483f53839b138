//! Module for coding raw genotype tokens into numeric dosages.
use ndarray::Array1;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GenotypeError {
    #[error("{side} variant has {found} samples, expected {expected}")]
    SampleCount {
        side: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Non-standard bacterial genotype '{token}' at sample {index} (expected 0 or 1)")]
    BacterialToken { token: String, index: usize },
}

/// Diploid human call to dosage. `None` for anything but `0/0`, `0/1` or `1/1`.
pub fn human_dosage(token: &str) -> Option<f64> {
    match token.trim() {
        "0/0" => Some(0.0),
        "0/1" => Some(1.0),
        "1/1" => Some(2.0),
        _ => None,
    }
}

/// Bacterial presence/absence call. `None` for anything but `0` or `1`.
pub fn bacterial_presence(token: &str) -> Option<f64> {
    match token.trim() {
        "0" => Some(0.0),
        "1" => Some(1.0),
        _ => None,
    }
}

/// Codes a human variant line.
///
/// Malformed calls are coded as 0 and reported once for the whole line, since the
/// same line is reused against every bacterial variant.
pub fn code_human<S: AsRef<str>>(
    tokens: &[S],
    n_samples: usize,
) -> Result<Array1<f64>, GenotypeError> {
    check_count("human", tokens.len(), n_samples)?;

    let mut bad = 0usize;
    let mut first_bad: Option<&str> = None;
    let dosages = tokens
        .iter()
        .map(|t| {
            human_dosage(t.as_ref()).unwrap_or_else(|| {
                bad += 1;
                first_bad.get_or_insert(t.as_ref());
                0.0
            })
        })
        .collect::<Array1<f64>>();

    if let Some(token) = first_bad {
        log::warn!(
            "{} non-standard human genotype(s) coded as 0/0 (first: '{}')",
            bad,
            token
        );
    }
    Ok(dosages)
}

/// Codes a bacterial variant line. Any token other than `0`/`1` is fatal.
pub fn code_bacterial<S: AsRef<str>>(
    tokens: &[S],
    n_samples: usize,
) -> Result<Array1<f64>, GenotypeError> {
    check_count("bacterial", tokens.len(), n_samples)?;

    tokens
        .iter()
        .enumerate()
        .map(|(index, t)| {
            bacterial_presence(t.as_ref()).ok_or_else(|| GenotypeError::BacterialToken {
                token: t.as_ref().to_string(),
                index,
            })
        })
        .collect()
}

fn check_count(side: &'static str, found: usize, expected: usize) -> Result<(), GenotypeError> {
    if found != expected {
        return Err(GenotypeError::SampleCount { side, expected, found });
    }
    Ok(())
}
