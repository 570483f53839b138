//! Module for handling I/O: variant line readers, the covariate loader and the
//! result writer. Paths ending in `.gz` are read and written through gzip.
use crate::pair::PairRecord;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Stdout, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0} contains no variants")]
    Empty(String),
    #[error("Could not parse '{value}' as a number in {path} line {line}")]
    Parse {
        path: String,
        line: usize,
        value: String,
    },
    #[error("Data alignment error: {0}")]
    Alignment(String),
}

/// Column names of the result table, in output order.
pub const RESULT_HEADER: [&str; 8] = [
    "human_line",
    "bact_line",
    "human_af",
    "bacterial_af",
    "chisq_p_val",
    "lrt_p_val",
    "beta",
    "comments",
];

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Opens a file for reading, decompressing it when the name ends in `.gz`.
pub fn open_text(path: &Path) -> Result<Box<dyn Read>, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_string_lossy().into()));
    }
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(MultiGzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Streams comma-separated variant lines, one genotype token per sample.
pub struct VariantReader<R: Read> {
    reader: csv::Reader<R>,
    record: StringRecord,
}

impl VariantReader<Box<dyn Read>> {
    pub fn from_path(path: &Path) -> Result<Self, IoError> {
        log::debug!("Opening variant file {:?}", path);
        Ok(Self::new(open_text(path)?))
    }
}

impl<R: Read> VariantReader<R> {
    pub fn new(rdr: R) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(b',')
            .from_reader(rdr);
        Self {
            reader,
            record: StringRecord::new(),
        }
    }

    /// Next variant as `(line number, tokens)`, or `None` at end of input.
    ///
    /// Line numbers are 1-based and count physical lines, so blank lines keep
    /// their place in the numbering.
    /// The csv reader skips empty lines itself.
    pub fn next_variant(&mut self) -> Result<Option<(u64, Vec<String>)>, IoError> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self.record.position().map_or(0, |p| p.line());
        let tokens = self.record.iter().map(str::to_string).collect();
        Ok(Some((line, tokens)))
    }
}

/// Number of samples, taken from the number of tokens on the first line.
pub fn count_samples(path: &Path) -> Result<usize, IoError> {
    let mut reader = VariantReader::from_path(path)?;
    match reader.next_variant()? {
        Some((_, tokens)) => Ok(tokens.len()),
        None => Err(IoError::Empty(path.to_string_lossy().into())),
    }
}

/// Number of the last variant line in the file (0 when there are none).
pub fn count_lines(path: &Path) -> Result<u64, IoError> {
    let mut reader = VariantReader::from_path(path)?;
    let mut last = 0;
    while let Some((line, _)) = reader.next_variant()? {
        last = line;
    }
    Ok(last)
}

/// Loads a numeric covariate matrix, one row per sample.
///
/// Values may be separated by whitespace or commas. Blank lines are ignored.
/// Every row must have the same number of columns and there must be exactly
/// `n_samples` rows.
pub fn load_covariates(path: &Path, n_samples: usize) -> Result<Array2<f64>, IoError> {
    log::info!("Loading covariates from {:?}", path);
    let path_str = path.to_string_lossy().to_string();
    let reader = BufReader::new(open_text(path)?);

    let mut values = Vec::new();
    let mut n_cols: Option<usize> = None;
    let mut n_rows = 0;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            continue;
        }

        match n_cols {
            None => n_cols = Some(fields.len()),
            Some(k) if k != fields.len() => {
                return Err(IoError::Alignment(format!(
                    "Covariate line {} has {} columns, expected {}",
                    i + 1,
                    fields.len(),
                    k
                )));
            }
            Some(_) => {}
        }

        for field in fields {
            let v = field.parse::<f64>().map_err(|_| IoError::Parse {
                path: path_str.clone(),
                line: i + 1,
                value: field.to_string(),
            })?;
            values.push(v);
        }
        n_rows += 1;
    }

    if n_rows != n_samples {
        return Err(IoError::Alignment(format!(
            "Covariate file has {} rows but there are {} samples",
            n_rows, n_samples
        )));
    }

    let n_cols = n_cols.unwrap_or(0);
    let covariates = Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| IoError::Alignment(e.to_string()))?;
    log::info!(
        "Covariate matrix: {} samples x {} covariates",
        covariates.nrows(),
        covariates.ncols()
    );
    log::warn!("Covariate rows are assumed to be in the same sample order as the variant files");
    Ok(covariates)
}

/// One output row.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct PairResult {
    pub human_line: u64,
    pub bact_line: u64,
    pub human_af: String,
    pub bacterial_af: String,
    pub chisq_p_val: String,
    pub lrt_p_val: String,
    pub beta: String,
    pub comments: String,
}

impl From<&PairRecord> for PairResult {
    fn from(pair: &PairRecord) -> Self {
        let (maf_x, maf_y) = pair.maf();
        Self {
            human_line: pair.human_line(),
            bact_line: pair.bact_line(),
            human_af: format!("{:.3}", maf_x),
            bacterial_af: format!("{:.3}", maf_y),
            chisq_p_val: format_scientific(pair.chisq_p()),
            lrt_p_val: format_scientific(pair.lrt_p()),
            beta: format!("{:.3}", pair.beta()),
            comments: pair.comment().to_string(),
        }
    }
}

/// Scientific notation with 3 decimals and a signed two-digit exponent,
/// e.g. `1.234e-05`.
pub fn format_scientific(v: f64) -> String {
    let s = format!("{:.3e}", v);
    // inf and NaN have no exponent
    if let Some((mantissa, exp)) = s.split_once('e') {
        if let Ok(e) = exp.parse::<i32>() {
            let sign = if e < 0 { '-' } else { '+' };
            return format!("{}e{}{:02}", mantissa, sign, e.unsigned_abs());
        }
    }
    s
}

/// Destination of the result table.
///
/// Must be closed with [`ResultSink::finish`] (or [`finish_results`]); dropping a
/// gzip sink writes the trailer but discards any error doing so.
pub enum ResultSink {
    Gzip(GzEncoder<BufWriter<File>>),
    File(BufWriter<File>),
    Stdout(BufWriter<Stdout>),
}

impl ResultSink {
    /// Writes the gzip trailer where there is one and flushes to the OS.
    pub fn finish(self) -> Result<(), IoError> {
        match self {
            ResultSink::Gzip(enc) => enc.finish()?.flush()?,
            ResultSink::File(mut w) => w.flush()?,
            ResultSink::Stdout(mut w) => w.flush()?,
        }
        Ok(())
    }
}

impl Write for ResultSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            ResultSink::Gzip(w) => w.write(buf),
            ResultSink::File(w) => w.write(buf),
            ResultSink::Stdout(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            ResultSink::Gzip(w) => w.flush(),
            ResultSink::File(w) => w.flush(),
            ResultSink::Stdout(w) => w.flush(),
        }
    }
}

/// Tab-separated result writer on `path`, or stdout when `None`. The header row
/// is written immediately.
pub fn result_writer(path: Option<&Path>) -> Result<csv::Writer<ResultSink>, IoError> {
    let sink = match path {
        Some(p) if is_gzip(p) => ResultSink::Gzip(GzEncoder::new(
            BufWriter::new(File::create(p)?),
            Compression::default(),
        )),
        Some(p) => ResultSink::File(BufWriter::new(File::create(p)?)),
        None => ResultSink::Stdout(BufWriter::new(std::io::stdout())),
    };
    let mut writer = tab_writer(sink);
    writer.write_record(RESULT_HEADER)?;
    Ok(writer)
}

/// Flushes the csv buffer and closes the sink, reporting any error on the way.
pub fn finish_results(writer: csv::Writer<ResultSink>) -> Result<(), IoError> {
    let sink = writer.into_inner().map_err(|e| IoError::Io(e.into_error()))?;
    sink.finish()
}

/// Tab-separated writer without a header row, over any sink.
pub fn tab_writer<W: Write>(sink: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(sink)
}
