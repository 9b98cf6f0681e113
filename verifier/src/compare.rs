// SPDX-License-Identifier: AGPL-3.0-only

//! Metric-versus-reference comparison.
//!
//! Bounds are inclusive. A one-sided reference (`upper = None`) lets a
//! metric improve without limit while still catching regressions below the
//! lower bound.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};
use crate::reference::Reference;
use crate::tolerances::NEAR_ZERO_EXPECTED;

/// A named measurement extracted from test output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl Metric {
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// Outcome of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub metric: String,
    pub value: f64,
    pub unit: String,
    pub expected: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub passed: bool,
    /// Signed distance to the violated bound: negative below, positive above.
    pub deviation: Option<f64>,
    /// `deviation / |expected|`, when there is a usable expected value.
    pub deviation_fraction: Option<f64>,
}

/// Judge `metric` against `reference`.
///
/// # Errors
///
/// `UnitMismatch` when the units differ, whatever the numbers say.
pub fn compare(metric: &Metric, reference: &Reference) -> Result<Comparison> {
    if metric.unit != reference.unit() {
        return Err(VerifyError::UnitMismatch {
            metric: metric.name.clone(),
            expected: reference.unit().to_string(),
            found: metric.unit.clone(),
        });
    }

    let value = metric.value;
    let (lower_bound, upper_bound) = reference.bounds();
    let below = lower_bound.filter(|lo| value < *lo);
    let above = upper_bound.filter(|hi| value > *hi);
    let deviation = below.or(above).map(|bound| value - bound);
    let passed = !value.is_nan() && deviation.is_none();

    let deviation_fraction = deviation.and_then(|d| {
        reference
            .expected()
            .filter(|e| e.abs() > NEAR_ZERO_EXPECTED)
            .map(|e| d / e.abs())
    });

    Ok(Comparison {
        metric: metric.name.clone(),
        value,
        unit: metric.unit.clone(),
        expected: reference.expected(),
        lower_bound,
        upper_bound,
        passed,
        deviation,
        deviation_fraction,
    })
}

impl Comparison {
    /// One-line description of the bounds and, on failure, the miss.
    #[must_use]
    pub fn describe(&self) -> String {
        let lo = self
            .lower_bound
            .map_or_else(|| String::from("-inf"), |v| format!("{v:.6e}"));
        let hi = self
            .upper_bound
            .map_or_else(|| String::from("+inf"), |v| format!("{v:.6e}"));
        let mut s = format!(
            "{}={:.6e} {} in [{lo}, {hi}]",
            self.metric, self.value, self.unit
        );
        if let Some(d) = self.deviation {
            s.push_str(&format!(", off by {d:+.6e}"));
            if let Some(f) = self.deviation_fraction {
                s.push_str(&format!(" ({:+.2}%)", f * 100.0));
            }
        } else if self.value.is_nan() {
            s.push_str(", value is NaN");
        }
        s
    }
}
