// SPDX-License-Identifier: AGPL-3.0-only

//! Typed value extraction from captured program output.
//!
//! Patterns are applied exactly as written. Nothing here adds anchors or
//! trims captures, so a definition that matches `256` inside `2560` is a
//! definition bug, not something the extractor papers over (see
//! [`crate::patterns`] for anchored building blocks).

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use regex::{CaptureMatches, Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};

/// Capture group selector: by name or by index (0 is the whole match).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Group {
    Index(usize),
    Name(String),
}

impl Group {
    fn is_defined_in(&self, pattern: &Regex) -> bool {
        match self {
            Self::Index(i) => *i < pattern.captures_len(),
            Self::Name(name) => pattern.capture_names().flatten().any(|n| n == name),
        }
    }

    fn value_in<'t>(&self, caps: &Captures<'t>) -> Option<&'t str> {
        let m = match self {
            Self::Index(i) => caps.get(*i),
            Self::Name(name) => caps.name(name),
        };
        m.map(|m| m.as_str())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for Group {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for Group {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

fn ensure_group(pattern: &Regex, group: &Group) -> Result<()> {
    if group.is_defined_in(pattern) {
        Ok(())
    } else {
        Err(VerifyError::MissingGroup {
            pattern: pattern.as_str().to_string(),
            group: group.to_string(),
        })
    }
}

/// Convert one capture. A group that did not take part in the match
/// converts as the empty string.
fn convert<T: FromStr>(caps: &Captures<'_>, group: &Group) -> Result<T> {
    let raw = group.value_in(caps).unwrap_or("");
    raw.parse::<T>().map_err(|_| VerifyError::Conversion {
        value: raw.to_string(),
        target: type_name::<T>(),
    })
}

/// First match of `pattern` in `text`, converted to `T`.
///
/// # Errors
///
/// `MissingGroup` if the pattern does not define `group`, `NotFound` if
/// nothing matches, `Conversion` if the capture does not parse as `T`.
pub fn extract_single<T: FromStr>(pattern: &Regex, text: &str, group: &Group) -> Result<T> {
    ensure_group(pattern, group)?;
    let caps = pattern
        .captures(text)
        .ok_or_else(|| VerifyError::NotFound {
            pattern: pattern.as_str().to_string(),
        })?;
    convert(&caps, group)
}

/// All non-overlapping matches of `pattern` in `text`, lazily converted.
///
/// # Errors
///
/// `MissingGroup` if the pattern does not define `group`. Per-match
/// conversion failures surface as `Err` items of the returned sequence.
pub fn extract_all<'r, 't, T: FromStr>(
    pattern: &'r Regex,
    text: &'t str,
    group: &Group,
) -> Result<Extraction<'r, 't, T>> {
    ensure_group(pattern, group)?;
    Ok(Extraction {
        pattern,
        text,
        group: group.clone(),
        inner: pattern.captures_iter(text),
        consumed: 0,
        _marker: PhantomData,
    })
}

/// Number of non-overlapping matches of `pattern` in `text`.
#[must_use]
pub fn count_matches(pattern: &Regex, text: &str) -> usize {
    pattern.find_iter(text).count()
}

/// Lazy, restartable sequence of converted matches.
///
/// Cloning preserves the current position; [`Extraction::restart`] returns
/// a sequence positioned before the first match.
pub struct Extraction<'r, 't, T> {
    pattern: &'r Regex,
    text: &'t str,
    group: Group,
    inner: CaptureMatches<'r, 't>,
    consumed: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, 't, T: FromStr> Extraction<'r, 't, T> {
    /// A fresh sequence over the same pattern and text.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self {
            pattern: self.pattern,
            text: self.text,
            group: self.group.clone(),
            inner: self.pattern.captures_iter(self.text),
            consumed: 0,
            _marker: PhantomData,
        }
    }

    /// The pattern this sequence searches for.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl<'r, 't> Extraction<'r, 't, f64> {
    /// Drain the remaining matches and aggregate them.
    ///
    /// # Errors
    ///
    /// The first conversion error, or `EmptySequence` naming the pattern if
    /// no match remained.
    pub fn aggregate(self, reduction: Reduction) -> Result<f64> {
        let label = self.pattern.as_str().to_string();
        let values = self.collect::<Result<Vec<f64>>>()?;
        reduction
            .apply(&values)
            .ok_or(VerifyError::EmptySequence { pattern: label })
    }
}

impl<T: FromStr> Iterator for Extraction<'_, '_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let caps = self.inner.next()?;
        self.consumed += 1;
        Some(convert(&caps, &self.group))
    }
}

impl<T> Clone for Extraction<'_, '_, T> {
    fn clone(&self) -> Self {
        let mut inner = self.pattern.captures_iter(self.text);
        for _ in 0..self.consumed {
            inner.next();
        }
        Self {
            pattern: self.pattern,
            text: self.text,
            group: self.group.clone(),
            inner,
            consumed: self.consumed,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Extraction<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extraction")
            .field("pattern", &self.pattern.as_str())
            .field("group", &self.group)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

/// Aggregation over an extracted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    First,
    Last,
    Min,
    Max,
    Mean,
    Sum,
}

impl Reduction {
    /// Apply to `values`; `None` when `values` is empty.
    #[must_use]
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        let (&first, rest) = values.split_first()?;
        Some(match self {
            Self::First => first,
            Self::Last => *values.last().unwrap_or(&first),
            Self::Min => rest.iter().copied().fold(first, f64::min),
            Self::Max => rest.iter().copied().fold(first, f64::max),
            Self::Sum => values.iter().sum(),
            #[allow(clippy::cast_precision_loss)]
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
        })
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Sum => "sum",
        };
        f.write_str(s)
    }
}

/// Aggregate `values` with `reduction`.
///
/// # Errors
///
/// `EmptySequence` if `values` yields nothing; every reduction needs at
/// least one value because an empty sequence means the output never
/// appeared.
pub fn reduce<I: IntoIterator<Item = f64>>(values: I, reduction: Reduction) -> Result<f64> {
    let values: Vec<f64> = values.into_iter().collect();
    reduction
        .apply(&values)
        .ok_or_else(|| VerifyError::EmptySequence {
            pattern: reduction.to_string(),
        })
}
