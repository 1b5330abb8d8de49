// rust/data-core/src/records.rs

//! Record framing for shard files.
//!
//! Shard contents are opaque serialized examples; this module only knows
//! where one record ends and the next begins.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{DataError, Result};

/// Describes how records are framed inside a shard file.
pub trait RecordFormat: Send + Sync {
    /// Locates the record starting at `offset`.
    ///
    /// Returns the payload range and the offset of the following record, or
    /// `None` if `data[offset..]` does not hold a complete record.
    fn next_record(&self, data: &[u8], offset: usize) -> Option<(Range<usize>, usize)>;

    /// Appends one framed record to `out`.
    fn encode(&self, payload: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Name of this record format
    fn name(&self) -> &'static str;

    /// Splits a whole shard into record payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the shard ends with a truncated record.
    fn split_records<'a>(&self, data: &'a [u8]) -> Result<Vec<&'a [u8]>> {
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (payload, next) = self.next_record(data, offset).ok_or_else(|| {
                DataError::serialization_with_source(
                    format!("truncated {} record at byte {offset}", self.name()),
                    std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
                )
            })?;
            records.push(&data[payload]);
            offset = next;
        }
        Ok(records)
    }
}

/// Length-prefixed records (4-byte big-endian length + data)
#[derive(Debug, Clone, Default)]
pub struct LengthPrefixedFormat;

impl LengthPrefixedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for LengthPrefixedFormat {
    fn next_record(&self, data: &[u8], offset: usize) -> Option<(Range<usize>, usize)> {
        let header_end = offset.checked_add(4)?;
        let length_bytes: [u8; 4] = data.get(offset..header_end)?.try_into().ok()?;
        let length = u32::from_be_bytes(length_bytes) as usize;

        let end = header_end.checked_add(length)?;
        if end <= data.len() {
            Some((header_end..end, end))
        } else {
            None
        }
    }

    fn encode(&self, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let length = u32::try_from(payload.len()).map_err(|e| {
            DataError::serialization_with_source("record longer than u32::MAX bytes", e)
        })?;
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(payload);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "length-prefixed"
    }
}

/// Newline-delimited records (JSONL, TSV, ...). The newline is not part of
/// the payload.
#[derive(Debug, Clone, Default)]
pub struct NewlineDelimitedFormat;

impl NewlineDelimitedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for NewlineDelimitedFormat {
    fn next_record(&self, data: &[u8], offset: usize) -> Option<(Range<usize>, usize)> {
        let rest = data.get(offset..)?;
        let newline = rest.iter().position(|&b| b == b'\n')?;
        let end = offset + newline;
        Some((offset..end, end + 1))
    }

    fn encode(&self, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if payload.contains(&b'\n') {
            return Err(DataError::Serialization {
                message: "newline-delimited record contains a newline".to_string(),
                source: None,
            });
        }
        out.extend_from_slice(payload);
        out.push(b'\n');
        Ok(())
    }

    fn name(&self) -> &'static str {
        "newline-delimited"
    }
}

/// Parses a format string into a RecordFormat implementation.
///
/// Supported formats:
/// - "length-prefixed" - 4-byte big-endian length prefix + data
/// - "newline" - Newline-delimited records
pub fn parse_format(format: &str) -> Result<Arc<dyn RecordFormat>> {
    match format {
        "length-prefixed" => Ok(Arc::new(LengthPrefixedFormat::new())),
        "newline" => Ok(Arc::new(NewlineDelimitedFormat::new())),
        _ => Err(DataError::config(format!(
            "unknown record format: '{}'. Expected 'length-prefixed' or 'newline'",
            format
        ))),
    }
}
