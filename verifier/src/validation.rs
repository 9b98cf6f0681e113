// SPDX-License-Identifier: AGPL-3.0-only

//! Validation harness for one regression case.
//!
//! The harness follows the pattern every case uses:
//!   - every sanity condition is recorded, pass or fail
//!   - every performance metric is recorded against its reference
//!   - metrics without a reference are kept but never fail the case
//!   - `finish` seals the outcomes into a write-once [`VerificationResult`]

use serde::{Deserialize, Serialize};

use crate::compare::{Comparison, Metric};
use crate::error::VerifyError;
use crate::reference::Target;
use crate::report::VerificationResult;
use crate::sanity::SanityOutcome;

/// Status of one metric in a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Pass,
    Fail,
    /// Extracted, but no reference for this target.
    Skipped,
    /// Extraction or comparison could not be carried out.
    Error,
}

impl MetricStatus {
    /// Whether this status lets the case pass.
    #[must_use]
    pub const fn is_acceptable(self) -> bool {
        matches!(self, Self::Pass | Self::Skipped)
    }
}

/// Recorded result of one performance metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricOutcome {
    pub name: String,
    pub status: MetricStatus,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub comparison: Option<Comparison>,
    pub reason: Option<String>,
}

impl MetricOutcome {
    #[must_use]
    pub fn compared(comparison: Comparison) -> Self {
        let status = if comparison.passed {
            MetricStatus::Pass
        } else {
            MetricStatus::Fail
        };
        Self {
            name: comparison.metric.clone(),
            status,
            value: Some(comparison.value),
            unit: Some(comparison.unit.clone()),
            reason: (!comparison.passed).then(|| comparison.describe()),
            comparison: Some(comparison),
        }
    }

    #[must_use]
    pub fn skipped(metric: Metric) -> Self {
        Self {
            name: metric.name,
            status: MetricStatus::Skipped,
            value: Some(metric.value),
            unit: Some(metric.unit),
            comparison: None,
            reason: Some(String::from("no reference for this target")),
        }
    }

    #[must_use]
    pub fn error(name: impl Into<String>, value: Option<&Metric>, err: &VerifyError) -> Self {
        let kind = if err.is_definition_error() {
            "definition error"
        } else {
            "measurement error"
        };
        Self {
            name: name.into(),
            status: MetricStatus::Error,
            value: value.map(|m| m.value),
            unit: value.map(|m| m.unit.clone()),
            comparison: None,
            reason: Some(format!("{kind}: {err}")),
        }
    }
}

fn non_finite(metric: &Metric) -> Option<VerifyError> {
    (!metric.value.is_finite()).then(|| VerifyError::NonFinite {
        metric: metric.name.clone(),
        value: metric.value,
    })
}

/// Accumulates outcomes for one case and produces the sealed result.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    /// Name of the case
    pub name: String,
    sanity: Vec<SanityOutcome>,
    metrics: Vec<MetricOutcome>,
}

impl ValidationHarness {
    /// Create a new harness for a named case.
    #[must_use = "validation harness must be used to record outcomes"]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sanity: Vec::new(),
            metrics: Vec::new(),
        }
    }

    /// Record one sanity outcome.
    pub fn record_sanity(&mut self, outcome: SanityOutcome) {
        self.sanity.push(outcome);
    }

    /// Record a batch of sanity outcomes in order.
    pub fn record_sanity_all(&mut self, outcomes: impl IntoIterator<Item = SanityOutcome>) {
        self.sanity.extend(outcomes);
    }

    /// Record a comparison result, or the error that prevented it.
    ///
    /// A NaN or infinite value is recorded as an error without the value,
    /// so every stored outcome stays representable in JSON.
    pub fn record_comparison(&mut self, metric: &Metric, result: Result<Comparison, VerifyError>) {
        let outcome = match (non_finite(metric), result) {
            (Some(e), _) => MetricOutcome::error(&metric.name, None, &e),
            (None, Ok(c)) => MetricOutcome::compared(c),
            (None, Err(e)) => MetricOutcome::error(&metric.name, Some(metric), &e),
        };
        self.metrics.push(outcome);
    }

    /// Record a metric that has no reference on this target.
    pub fn record_unreferenced(&mut self, metric: Metric) {
        let outcome = match non_finite(&metric) {
            Some(e) => MetricOutcome::error(&metric.name, None, &e),
            None => MetricOutcome::skipped(metric),
        };
        self.metrics.push(outcome);
    }

    /// Record a metric that could not be extracted.
    pub fn record_extraction_error(&mut self, name: &str, err: &VerifyError) {
        self.metrics.push(MetricOutcome::error(name, None, err));
    }

    /// Number of checks (sanity and metric) that passed. Skipped metrics
    /// count as neither passed nor failed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.sanity.iter().filter(|s| s.passed).count()
            + self
                .metrics
                .iter()
                .filter(|m| m.status == MetricStatus::Pass)
                .count()
    }

    /// Total number of recorded checks.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.sanity.len() + self.metrics.len()
    }

    /// Whether the case passes so far.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.sanity.iter().all(|s| s.passed) && self.metrics.iter().all(|m| m.status.is_acceptable())
    }

    /// Seal the outcomes into a result.
    pub fn finish(self, run_id: &str, target: &Target, scale: Option<&str>) -> VerificationResult {
        let passed = self.all_passed();
        VerificationResult::new(
            self.name,
            run_id.to_string(),
            target.clone(),
            scale.map(str::to_string),
            self.sanity,
            self.metrics,
            passed,
        )
    }
}
