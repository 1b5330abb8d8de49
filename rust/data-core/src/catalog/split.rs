// rust/data-core/src/catalog/split.rs

//! Split expressions.
//!
//! A split expression names one or more splits, each optionally sliced:
//! `train`, `train[:1%]`, `train[100:-100]`, `train[:50%]+validation`.
//! Absolute bounds count examples (negative values count from the end);
//! percent bounds are rounded to the nearest example. Out-of-range bounds
//! are clamped.

use std::ops::Range;

use super::{DatasetInfo, DatasetSize, FileInstruction, SplitInfo};
use crate::error::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Absolute(i64),
    Percent(i64),
}

impl Bound {
    fn parse(text: &str, expr: &str) -> Result<Option<Self>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let invalid = || DataError::config(format!("invalid bound '{text}' in split '{expr}'"));
        match text.strip_suffix('%') {
            Some(pct) => {
                let pct: i64 = pct.trim().parse().map_err(|_| invalid())?;
                if !(-100..=100).contains(&pct) {
                    return Err(invalid());
                }
                Ok(Some(Bound::Percent(pct)))
            }
            None => text.parse().map(|v| Some(Bound::Absolute(v))).map_err(|_| invalid()),
        }
    }

    /// Absolute example offset of this bound in a split of `total` examples.
    fn resolve(self, total: u64) -> u64 {
        let n = i128::from(total);
        let offset = match self {
            Bound::Absolute(v) => {
                let v = i128::from(v);
                if v < 0 {
                    n + v
                } else {
                    v
                }
            }
            Bound::Percent(p) => {
                let scaled = (i128::from(p).abs() * n + 50) / 100;
                if p < 0 {
                    n - scaled
                } else {
                    scaled
                }
            }
        };
        offset.clamp(0, n) as u64
    }
}

/// One `+`-separated term of a split expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSlice {
    pub split: String,
    pub from: Option<Bound>,
    pub to: Option<Bound>,
}

impl SplitSlice {
    /// Parses a single term such as `train[10:20%]`.
    pub fn parse(term: &str) -> Result<Self> {
        let term = term.trim();
        let invalid = |why: &str| DataError::config(format!("invalid split '{term}': {why}"));

        let (split, slice) = match term.find('[') {
            Some(open) => {
                let inner = term[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("missing closing ']'"))?;
                (term[..open].trim(), Some(inner))
            }
            None => (term, None),
        };

        if split.is_empty() || split.contains(|c: char| "[]:+%".contains(c)) {
            return Err(invalid("bad split name"));
        }

        let (from, to) = match slice {
            Some(inner) => {
                let (from, to) = inner
                    .split_once(':')
                    .ok_or_else(|| invalid("slice must contain ':'"))?;
                (Bound::parse(from, term)?, Bound::parse(to, term)?)
            }
            None => (None, None),
        };

        Ok(Self {
            split: split.to_string(),
            from,
            to,
        })
    }

    /// Parses a full expression of `+`-joined terms.
    pub fn parse_all(expr: &str) -> Result<Vec<Self>> {
        expr.split('+').map(Self::parse).collect()
    }

    /// Example range selected from a split of `total` examples.
    pub fn range(&self, total: u64) -> Range<u64> {
        let start = self.from.map_or(0, |b| b.resolve(total));
        let end = self.to.map_or(total, |b| b.resolve(total));
        start..end.max(start)
    }
}

fn lookup<'a>(info: &'a DatasetInfo, split: &str) -> Result<&'a SplitInfo> {
    info.splits.get(split).ok_or_else(|| {
        let available: Vec<&str> = info.splits.keys().map(String::as_str).collect();
        DataError::config(format!(
            "unknown split '{}' for dataset '{}' (available: {})",
            split,
            info.name,
            available.join(", ")
        ))
    })
}

/// Computes the shard reads that make up `expr`, in split and shard order.
///
/// Shards that contribute no examples are omitted, so the result may be
/// empty; deciding whether that is an error is left to the caller.
///
/// # Errors
///
/// Returns a configuration error for malformed expressions or unknown
/// splits.
pub fn file_instructions(info: &DatasetInfo, expr: &str) -> Result<Vec<FileInstruction>> {
    let mut instructions = Vec::new();

    for slice in SplitSlice::parse_all(expr)? {
        let split = lookup(info, &slice.split)?;
        let wanted = slice.range(split.shard_examples());

        let mut shard_start = 0u64;
        for shard in &split.shards {
            let shard_end = shard_start.saturating_add(shard.num_examples);
            let from = wanted.start.max(shard_start);
            let to = wanted.end.min(shard_end);
            if from < to {
                instructions.push(FileInstruction {
                    filename: shard.filename.clone(),
                    skip: from - shard_start,
                    take: to - from,
                });
            }
            shard_start = shard_end;
        }
    }

    Ok(instructions)
}

/// Declared size of `expr`.
///
/// Any term whose split declares a non-positive count makes the whole
/// expression unbounded, as does a union whose total exceeds `u64`.
///
/// # Errors
///
/// Returns a configuration error for malformed expressions or unknown
/// splits.
pub fn split_size(info: &DatasetInfo, expr: &str) -> Result<DatasetSize> {
    let mut total = 0u64;

    for slice in SplitSlice::parse_all(expr)? {
        let split = lookup(info, &slice.split)?;
        let declared = match DatasetSize::from_declared(split.num_examples) {
            DatasetSize::Finite(n) => n,
            DatasetSize::Unbounded => return Ok(DatasetSize::Unbounded),
        };
        let range = slice.range(declared);
        match total.checked_add(range.end - range.start) {
            Some(sum) => total = sum,
            None => return Ok(DatasetSize::Unbounded),
        }
    }

    Ok(DatasetSize::Finite(total))
}
