//! Chunk wire format: one JSON header line, a `\n` delimiter, then the raw
//! chunk body.

use serde::{Deserialize, Serialize};

/// Header carried in-band with every chunk's bytes, both on upload and on
/// download.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_index: u64,
    pub filename: String,
    pub total_chunks: u64,
    pub md5: String,
}

/// Hard cap on a header line's length, so a malformed stream that never
/// sends `\n` cannot exhaust memory before we give up.
pub const MAX_HEADER_LINE_BYTES: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ChunkFormatError {
    #[error("chunk header exceeds {MAX_HEADER_LINE_BYTES} bytes without a newline delimiter")]
    HeaderTooLong,
    #[error("chunk payload has no newline-delimited header")]
    MissingDelimiter,
    #[error("invalid chunk header JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl ChunkHeader {
    pub fn new(chunk_index: u64, filename: impl Into<String>, total_chunks: u64, md5: String) -> Self {
        Self {
            chunk_index,
            filename: filename.into(),
            total_chunks,
            md5,
        }
    }

    /// Serializes the header as one JSON line terminated by `\n`.
    pub fn encode_line(&self) -> Vec<u8> {
        let mut line = serde_json::to_vec(self).expect("ChunkHeader always serializes");
        line.push(b'\n');
        line
    }

    /// Builds the full wire payload: header line followed by the body bytes.
    pub fn frame(&self, body: &[u8]) -> Vec<u8> {
        let mut framed = self.encode_line();
        framed.extend_from_slice(body);
        framed
    }

    /// Splits a wire payload into its header and body, bounded by
    /// [`MAX_HEADER_LINE_BYTES`].
    pub fn parse(payload: &[u8]) -> Result<(Self, &[u8]), ChunkFormatError> {
        let scan_window = &payload[..payload.len().min(MAX_HEADER_LINE_BYTES)];
        let newline_pos = scan_window
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| {
                if payload.len() > MAX_HEADER_LINE_BYTES {
                    ChunkFormatError::HeaderTooLong
                } else {
                    ChunkFormatError::MissingDelimiter
                }
            })?;
        let header: ChunkHeader = serde_json::from_slice(&payload[..newline_pos])?;
        Ok((header, &payload[newline_pos + 1..]))
    }
}

/// md5 digest of `data`, lowercase hex.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Number of chunks a file of `file_size` bytes splits into at `chunk_size`
/// bytes per chunk. A zero-byte file yields zero chunks.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> u64 {
    if file_size == 0 {
        0
    } else {
        (file_size + chunk_size - 1) / chunk_size
    }
}
