// SPDX-License-Identifier: AGPL-3.0-only

//! Case evaluation: definition + captured output → verification result.
//!
//! Verification errors (missing patterns, unit mismatches, empty
//! extractions) are recorded inside the result. Only loading a case
//! (definition file, stage directory) can fail, and in a batch that failure
//! is confined to its own entry.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::compare::compare;
use crate::definition::TestDefinition;
use crate::error::{Result, VerifyError};
use crate::reference::Target;
use crate::report::VerificationResult;
use crate::sanity::{evaluate_all, CapturedOutput, StageLayout};
use crate::validation::ValidationHarness;

/// Evaluate one case against already-captured output.
#[must_use]
pub fn evaluate(
    definition: &TestDefinition,
    output: &CapturedOutput,
    target: &Target,
    scale: Option<&str>,
    run_id: &str,
) -> VerificationResult {
    let _span = info_span!("evaluate", case = %definition.name, %target, run_id).entered();
    let mut harness = ValidationHarness::new(&definition.name);

    harness.record_sanity_all(evaluate_all(&definition.sanity, output));

    for perf in &definition.performance {
        let metric = match perf.extract(output) {
            Ok(m) => m,
            Err(e) => {
                warn!(metric = %perf.name, error = %e, "extraction failed");
                harness.record_extraction_error(&perf.name, &e);
                continue;
            }
        };
        match definition.reference_for(target, scale, &metric.name) {
            Some(reference) => {
                let result = compare(&metric, reference);
                harness.record_comparison(&metric, result);
            }
            None => harness.record_unreferenced(metric),
        }
    }

    let result = harness.finish(run_id, target, scale);
    info!(passed = result.passed(), failures = result.failures().len(), "case verified");
    result
}

/// One case in a batch manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequest {
    pub run_id: String,
    pub definition: PathBuf,
    pub stage_dir: PathBuf,
    pub system: String,
    pub partition: String,
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub layout: StageLayout,
}

impl CaseRequest {
    #[must_use]
    pub fn target(&self) -> Target {
        Target::new(&self.system, &self.partition)
    }

    /// Load the definition and the captured output, then evaluate.
    ///
    /// # Errors
    ///
    /// Any error loading the definition or reading the stage directory.
    pub fn run(&self) -> Result<VerificationResult> {
        let definition = TestDefinition::load(&self.definition)?;
        let output = CapturedOutput::from_stage_dir(
            &self.stage_dir,
            &self.layout,
            definition.auxiliary_files(),
        )?;
        Ok(evaluate(
            &definition,
            &output,
            &self.target(),
            self.scale.as_deref(),
            &self.run_id,
        ))
    }
}

/// A case that could not be evaluated at all.
#[derive(Debug)]
pub struct CaseFailure {
    pub run_id: String,
    pub error: VerifyError,
}

/// Batch manifest: the cases of one reporting run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub cases: Vec<CaseRequest>,
}

impl Manifest {
    /// Read a JSON manifest.
    ///
    /// # Errors
    ///
    /// `Io` / `Json` if the manifest cannot be read or parsed.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Evaluate every case in parallel. Output order matches input order; a
/// case that fails to load yields a [`CaseFailure`] without affecting the
/// others.
#[must_use]
pub fn evaluate_batch(
    requests: &[CaseRequest],
) -> Vec<std::result::Result<VerificationResult, CaseFailure>> {
    requests
        .par_iter()
        .map(|req| {
            req.run().map_err(|error| {
                warn!(run_id = %req.run_id, %error, "case could not be evaluated");
                CaseFailure {
                    run_id: req.run_id.clone(),
                    error,
                }
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validation::MetricStatus;

    const DEF: &str = r#"{
        "name": "stream_triad",
        "sanity": [
            {"kind": "found", "label": "validated", "pattern": "Solution Validates"},
            {"kind": "not_found", "label": "clean stderr", "pattern": "(?i)error", "stream": "stderr"}
        ],
        "performance": [
            {"name": "triad", "pattern": "Triad:\\s+(?P<triad>\\S+)\\s+\\S+",
             "group": "triad", "unit": "MB/s", "reduce": "min"},
            {"name": "copy", "pattern": "Copy:\\s+(\\S+)", "unit": "MB/s"}
        ],
        "references": {
            "daint:gpu": {"triad": [122000.0, -0.05, 0.05, "MB/s"]}
        }
    }"#;

    fn definition() -> TestDefinition {
        TestDefinition::from_json(DEF).unwrap()
    }

    #[test]
    fn passing_case() {
        let out = CapturedOutput::new(
            "Copy: 90000.0 0.1\nTriad: 121000.0 0.1\nSolution Validates\n",
            "",
        );
        let res = evaluate(&definition(), &out, &Target::new("daint", "gpu"), None, "r1");
        assert!(res.passed(), "{}", res.render());
        assert_eq!(res.metrics()[1].status, MetricStatus::Skipped);
    }

    #[test]
    fn every_failure_is_reported() {
        let out = CapturedOutput::new("Triad: 14000.0 0.1\n", "ERROR: node down\n");
        let res = evaluate(&definition(), &out, &Target::new("daint", "gpu"), None, "r1");
        assert!(!res.passed());
        assert_eq!(res.failures(), vec!["validated", "clean stderr", "triad", "copy"]);
        assert_eq!(res.metrics()[1].status, MetricStatus::Error);
    }

    #[test]
    fn nan_output_is_a_measurement_error() {
        let out = CapturedOutput::new("Copy: inf 0\nTriad: nan 0.1\nSolution Validates\n", "");
        let res = evaluate(&definition(), &out, &Target::new("daint", "gpu"), None, "r1");
        assert!(!res.passed());
        assert_eq!(res.failures(), vec!["triad", "copy"]);
        for m in res.metrics() {
            assert_eq!(m.status, MetricStatus::Error);
            assert_eq!(m.value, None);
            assert!(m.reason.as_deref().unwrap().starts_with("measurement error"));
        }
        let back: VerificationResult =
            serde_json::from_str(&serde_json::to_string(&res).unwrap()).unwrap();
        assert_eq!(back.failures(), res.failures());
    }

    #[test]
    fn unknown_target_skips_comparison() {
        let out = CapturedOutput::new("Copy: 1 0\nTriad: 1.0 0.1\nSolution Validates\n", "");
        let res = evaluate(&definition(), &out, &Target::new("eiger", "mc"), None, "r1");
        assert!(res.passed());
        assert!(res
            .metrics()
            .iter()
            .all(|m| m.status == MetricStatus::Skipped));
    }

    #[test]
    fn manifest_parses_with_defaults() {
        let json = r#"{"cases": [{"run_id": "r1", "definition": "d.json",
            "stage_dir": "stage", "system": "daint", "partition": "gpu"}]}"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.cases[0].layout, StageLayout::default());
        assert_eq!(m.cases[0].scale, None);
        assert_eq!(m.cases[0].target(), Target::new("daint", "gpu"));
    }
}
