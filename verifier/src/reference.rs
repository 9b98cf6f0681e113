// SPDX-License-Identifier: AGPL-3.0-only

//! Reference values and per-target reference tables.
//!
//! A reference is the tuple `[expected, lower, upper, unit]`. With an
//! expected value, `lower` and `upper` are signed fractions of it
//! (`-0.05` = 5% below); without one they are absolute bounds. `null` in
//! either tolerance slot leaves that side open.
//!
//! Tables are keyed by target: `system:partition`, `system:*`, `system`,
//! or `*`, tried in that order. The first key present supplies the whole
//! metric set.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};

/// Wire form of a [`Reference`].
type ReferenceTuple = (Option<f64>, Option<f64>, Option<f64>, String);

/// Expected value with asymmetric tolerance and unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReferenceTuple", into = "ReferenceTuple")]
pub struct Reference {
    expected: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
    unit: String,
}

impl Reference {
    /// Build and validate a reference.
    ///
    /// # Errors
    ///
    /// `InvalidReference` if a value is not finite, if a relative lower
    /// tolerance is positive or a relative upper tolerance negative, or if
    /// absolute bounds are inverted.
    pub fn new(
        expected: Option<f64>,
        lower: Option<f64>,
        upper: Option<f64>,
        unit: impl Into<String>,
    ) -> Result<Self> {
        let unit = unit.into();
        for v in [expected, lower, upper].into_iter().flatten() {
            if !v.is_finite() {
                return Err(VerifyError::InvalidReference(format!(
                    "non-finite value {v} ({unit})"
                )));
            }
        }
        if expected.is_some() {
            if let Some(lo) = lower.filter(|lo| *lo > 0.0) {
                return Err(VerifyError::InvalidReference(format!(
                    "lower tolerance {lo} must be <= 0"
                )));
            }
            if let Some(hi) = upper.filter(|hi| *hi < 0.0) {
                return Err(VerifyError::InvalidReference(format!(
                    "upper tolerance {hi} must be >= 0"
                )));
            }
        } else if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(VerifyError::InvalidReference(format!(
                    "lower bound {lo} exceeds upper bound {hi}"
                )));
            }
        }
        Ok(Self {
            expected,
            lower,
            upper,
            unit,
        })
    }

    /// Relative reference around `expected`.
    ///
    /// # Errors
    ///
    /// See [`Reference::new`].
    pub fn relative(
        expected: f64,
        lower: Option<f64>,
        upper: Option<f64>,
        unit: impl Into<String>,
    ) -> Result<Self> {
        Self::new(Some(expected), lower, upper, unit)
    }

    /// Bounds-only reference with absolute limits.
    ///
    /// # Errors
    ///
    /// See [`Reference::new`].
    pub fn absolute(lower: Option<f64>, upper: Option<f64>, unit: impl Into<String>) -> Result<Self> {
        Self::new(None, lower, upper, unit)
    }

    #[must_use]
    pub const fn expected(&self) -> Option<f64> {
        self.expected
    }

    #[must_use]
    pub const fn lower_tolerance(&self) -> Option<f64> {
        self.lower
    }

    #[must_use]
    pub const fn upper_tolerance(&self) -> Option<f64> {
        self.upper
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Absolute `(lower, upper)` bounds; `None` is an open end.
    ///
    /// Relative tolerances scale with `|expected|`, so a negative lower
    /// fraction always moves the bound down, whatever the sign of the
    /// expected value.
    #[must_use]
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match self.expected {
            Some(e) => (
                self.lower.map(|t| scaled(e, t)),
                self.upper.map(|t| scaled(e, t)),
            ),
            None => (self.lower, self.upper),
        }
    }
}

fn scaled(expected: f64, fraction: f64) -> f64 {
    if expected >= 0.0 {
        expected * (1.0 + fraction)
    } else {
        expected * (1.0 - fraction)
    }
}

impl TryFrom<ReferenceTuple> for Reference {
    type Error = VerifyError;

    fn try_from((expected, lower, upper, unit): ReferenceTuple) -> Result<Self> {
        Self::new(expected, lower, upper, unit)
    }
}

impl From<Reference> for ReferenceTuple {
    fn from(r: Reference) -> Self {
        (r.expected, r.lower, r.upper, r.unit)
    }
}

/// Deployment target a reference applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub system: String,
    pub partition: String,
}

impl Target {
    #[must_use]
    pub fn new(system: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            partition: partition.into(),
        }
    }

    /// Table keys to try for this target, most specific first.
    #[must_use]
    pub fn lookup_keys(&self) -> [String; 4] {
        [
            format!("{}:{}", self.system, self.partition),
            format!("{}:*", self.system),
            self.system.clone(),
            String::from("*"),
        ]
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.partition)
    }
}

impl FromStr for Target {
    type Err = VerifyError;

    /// Parse `system:partition`; a bare `system` gets the `*` partition.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((sys, part)) if !sys.is_empty() && !part.is_empty() => Ok(Self::new(sys, part)),
            None if !s.is_empty() => Ok(Self::new(s, "*")),
            _ => Err(VerifyError::InvalidReference(format!("malformed target `{s}`"))),
        }
    }
}

/// Metric name → reference for one target key.
pub type MetricReferences = BTreeMap<String, Reference>;

/// Target key → metric references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTable(BTreeMap<String, MetricReferences>);

impl ReferenceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a reference for `metric` under target `key`.
    pub fn insert(&mut self, key: impl Into<String>, metric: impl Into<String>, reference: Reference) {
        self.0
            .entry(key.into())
            .or_default()
            .insert(metric.into(), reference);
    }

    /// Metric set for `target`, following the wildcard fallback order.
    #[must_use]
    pub fn for_target(&self, target: &Target) -> Option<&MetricReferences> {
        target.lookup_keys().iter().find_map(|k| self.0.get(k))
    }

    /// Reference for one metric on `target`.
    #[must_use]
    pub fn lookup(&self, target: &Target, metric: &str) -> Option<&Reference> {
        self.for_target(target).and_then(|refs| refs.get(metric))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Target keys present in the table.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
