//! Module for splitting the human-variant stream into line ranges that independent
//! processes can run. Chunks share no state; each process builds its own records.
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ChunkError {
    #[error("Chunk start ({start}) must be at least 1 and less than chunk end ({end})")]
    InvalidRange { start: u64, end: u64 },
    #[error("Number of chunks must be at least 1")]
    NoChunks,
}

/// Half-open range `[start, end)` of 1-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChunk {
    start: u64,
    end: u64,
}

impl LineChunk {
    pub fn new(start: u64, end: u64) -> Result<Self, ChunkError> {
        if start == 0 || start >= end {
            return Err(ChunkError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The whole stream.
    pub fn all() -> Self {
        Self { start: 1, end: u64::MAX }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, line: u64) -> bool {
        line >= self.start && line < self.end
    }

    /// Lines to skip before the first line of the chunk.
    pub fn lines_before(&self) -> u64 {
        self.start - 1
    }

    /// True once `line` is at or past the end of the chunk.
    pub fn is_past(&self, line: u64) -> bool {
        line >= self.end
    }
}

/// Splits lines `1..=total_lines` into at most `n_chunks` contiguous, disjoint
/// chunks whose lengths differ by at most one.
pub fn partition(total_lines: u64, n_chunks: usize) -> Result<Vec<LineChunk>, ChunkError> {
    if n_chunks == 0 {
        return Err(ChunkError::NoChunks);
    }
    let n = (n_chunks as u64).min(total_lines);
    if n == 0 {
        return Ok(Vec::new());
    }

    let base = total_lines / n;
    let extra = total_lines % n;
    let mut chunks = Vec::with_capacity(n as usize);
    let mut start = 1;
    for i in 0..n {
        let len = base + u64::from(i < extra);
        chunks.push(LineChunk { start, end: start + len });
        start += len;
    }
    Ok(chunks)
}
