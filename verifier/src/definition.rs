// SPDX-License-Identifier: AGPL-3.0-only

//! Declarative test-case definitions.
//!
//! A definition names the sanity conditions, the performance patterns and
//! the per-target reference tables of one regression case. It is read from
//! JSON once and compiled, so every pattern error surfaces at load time
//! rather than halfway through a run.
//!
//! ```json
//! {
//!   "name": "stream_triad",
//!   "sanity": [{"kind": "found", "label": "validated", "pattern": "Solution Validates"}],
//!   "performance": [{"name": "triad", "pattern": "Triad:\\s+(?P<triad>\\S+)\\s+\\S+",
//!                    "group": "triad", "unit": "MB/s", "reduce": "min"}],
//!   "references": {"daint:gpu": {"triad": [122000.0, -0.05, 0.05, "MB/s"]}}
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::compare::Metric;
use crate::error::{Result, VerifyError};
use crate::extract::{extract_all, Group, Reduction};
use crate::reference::{Reference, ReferenceTable, Target};
use crate::sanity::{CapturedOutput, CheckKind, Condition, SanityCheck, Stream};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SanityEntry {
    kind: CheckKind,
    label: Option<String>,
    pattern: String,
    #[serde(default)]
    stream: Stream,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PerformanceEntry {
    name: String,
    pattern: String,
    #[serde(default = "default_group")]
    group: Group,
    unit: String,
    #[serde(default)]
    reduce: Reduction,
    #[serde(default)]
    stream: Stream,
}

fn default_group() -> Group {
    Group::Index(1)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    name: String,
    #[serde(default)]
    sanity: Vec<SanityEntry>,
    #[serde(default)]
    performance: Vec<PerformanceEntry>,
    #[serde(default)]
    references: ReferenceTable,
    #[serde(default)]
    scales: BTreeMap<String, ReferenceTable>,
}

/// Auxiliary file names must stay inside the stage directory.
fn check_stream(stream: &Stream) -> Result<()> {
    let Stream::File(name) = stream else {
        return Ok(());
    };
    let path = Path::new(name);
    let inside = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(())
    } else {
        Err(VerifyError::InvalidDefinition(format!(
            "output file `{name}` must be a relative path inside the stage directory"
        )))
    }
}

/// How to turn output into one performance metric.
#[derive(Debug, Clone)]
pub struct PerfPattern {
    pub name: String,
    pub pattern: Regex,
    pub group: Group,
    pub unit: String,
    pub reduction: Reduction,
    pub stream: Stream,
}

impl PerfPattern {
    /// Extract every match from the selected stream and reduce to a metric.
    ///
    /// # Errors
    ///
    /// `MissingStream`, `MissingGroup`, `Conversion`, `EmptySequence`, or
    /// `NonFinite` when the output reports `nan` / `inf`.
    pub fn extract(&self, output: &CapturedOutput) -> Result<Metric> {
        let text = output.stream(&self.stream)?;
        let values = extract_all::<f64>(&self.pattern, text, &self.group)?;
        let value = values.aggregate(self.reduction)?;
        if !value.is_finite() {
            return Err(VerifyError::NonFinite {
                metric: self.name.clone(),
                value,
            });
        }
        debug!(metric = %self.name, value, reduction = %self.reduction, "extracted");
        Ok(Metric::new(&self.name, value, &self.unit))
    }
}

/// A compiled test-case definition.
#[derive(Debug, Clone)]
pub struct TestDefinition {
    pub name: String,
    pub sanity: Vec<SanityCheck>,
    pub performance: Vec<PerfPattern>,
    pub references: ReferenceTable,
    pub scales: BTreeMap<String, ReferenceTable>,
}

impl TestDefinition {
    /// Parse and compile a JSON definition.
    ///
    /// # Errors
    ///
    /// `Json` for malformed input or invalid references, `InvalidPattern`
    /// for a pattern that does not compile.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: DefinitionFile = serde_json::from_str(json)?;
        Self::compile(file)
    }

    /// Read, parse and compile a definition file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read; otherwise as [`TestDefinition::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let file: DefinitionFile = serde_json::from_reader(reader)?;
        Self::compile(file)
    }

    fn compile(file: DefinitionFile) -> Result<Self> {
        let mut names = BTreeSet::new();
        if let Some(dup) = file.performance.iter().find(|e| !names.insert(e.name.as_str())) {
            return Err(VerifyError::InvalidDefinition(format!(
                "metric `{}` is defined more than once",
                dup.name
            )));
        }
        let streams = file
            .sanity
            .iter()
            .map(|e| &e.stream)
            .chain(file.performance.iter().map(|e| &e.stream));
        for stream in streams {
            check_stream(stream)?;
        }

        let sanity = file
            .sanity
            .into_iter()
            .map(|e| -> Result<SanityCheck> {
                let pattern = Regex::new(&e.pattern)?;
                let label = e.label.unwrap_or(e.pattern);
                let cond = Condition::new(label, pattern, e.stream);
                Ok(match e.kind {
                    CheckKind::Found => SanityCheck::Found(cond),
                    CheckKind::NotFound => SanityCheck::NotFound(cond),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let performance = file
            .performance
            .into_iter()
            .map(|e| -> Result<PerfPattern> {
                Ok(PerfPattern {
                    pattern: Regex::new(&e.pattern)?,
                    name: e.name,
                    group: e.group,
                    unit: e.unit,
                    reduction: e.reduce,
                    stream: e.stream,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: file.name,
            sanity,
            performance,
            references: file.references,
            scales: file.scales,
        })
    }

    /// Reference for `metric` on `target`. A scale table that has an entry
    /// for the target takes precedence over the base table.
    #[must_use]
    pub fn reference_for(
        &self,
        target: &Target,
        scale: Option<&str>,
        metric: &str,
    ) -> Option<&Reference> {
        let table = scale
            .and_then(|s| self.scales.get(s))
            .filter(|t| t.for_target(target).is_some())
            .unwrap_or(&self.references);
        table.lookup(target, metric)
    }

    /// Auxiliary file names read by any check or pattern.
    #[must_use]
    pub fn auxiliary_files(&self) -> BTreeSet<&str> {
        let sanity_streams = self.sanity.iter().map(|c| &c.condition().stream);
        let perf_streams = self.performance.iter().map(|p| &p.stream);
        sanity_streams
            .chain(perf_streams)
            .filter_map(|s| match s {
                Stream::File(name) => Some(name.as_str()),
                Stream::Stdout | Stream::Stderr => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const STREAM_DEF: &str = r#"{
        "name": "stream_triad",
        "sanity": [
            {"kind": "found", "label": "validated", "pattern": "Solution Validates"},
            {"kind": "not_found", "pattern": "(?i)error", "stream": "stderr"}
        ],
        "performance": [
            {"name": "triad", "pattern": "Triad:\\s+(?P<triad>\\S+)\\s+\\S+",
             "group": "triad", "unit": "MB/s", "reduce": "min"},
            {"name": "elapsed", "pattern": "elapsed (\\S+)", "unit": "s",
             "stream": {"file": "timing.log"}}
        ],
        "references": {
            "daint:gpu": {"triad": [122000.0, -0.05, 0.05, "MB/s"]},
            "*": {"triad": [null, 1000.0, null, "MB/s"]}
        },
        "scales": {
            "large": {"daint:gpu": {"triad": [130000.0, -0.05, null, "MB/s"]}}
        }
    }"#;

    #[test]
    fn parses_and_compiles() {
        let d = TestDefinition::from_json(STREAM_DEF).unwrap();
        assert_eq!(d.name, "stream_triad");
        assert_eq!(d.sanity.len(), 2);
        assert_eq!(d.sanity[1].kind(), CheckKind::NotFound);
        assert_eq!(d.sanity[1].condition().label, "(?i)error");
        assert_eq!(d.performance[0].reduction, Reduction::Min);
        assert_eq!(d.performance[1].group, Group::Index(1));
        assert_eq!(d.performance[1].reduction, Reduction::First);
    }

    #[test]
    fn scale_table_overrides_base() {
        let d = TestDefinition::from_json(STREAM_DEF).unwrap();
        let t = Target::new("daint", "gpu");
        let base = d.reference_for(&t, None, "triad").unwrap();
        assert_eq!(base.expected(), Some(122_000.0));
        let large = d.reference_for(&t, Some("large"), "triad").unwrap();
        assert_eq!(large.expected(), Some(130_000.0));
        let unknown_scale = d.reference_for(&t, Some("tiny"), "triad").unwrap();
        assert_eq!(unknown_scale.expected(), Some(122_000.0));
    }

    #[test]
    fn scale_without_target_entry_falls_back() {
        let d = TestDefinition::from_json(STREAM_DEF).unwrap();
        let t = Target::new("eiger", "mc");
        let r = d.reference_for(&t, Some("large"), "triad").unwrap();
        assert_eq!(r.expected(), None);
        assert_eq!(r.bounds(), (Some(1000.0), None));
    }

    #[test]
    fn auxiliary_files_are_collected() {
        let d = TestDefinition::from_json(STREAM_DEF).unwrap();
        assert_eq!(d.auxiliary_files().into_iter().collect::<Vec<_>>(), vec!["timing.log"]);
    }

    #[test]
    fn perf_pattern_extracts_metric() {
        let d = TestDefinition::from_json(STREAM_DEF).unwrap();
        let out = CapturedOutput::new(
            "Triad:  14100.0  0.1\nTriad:  14000.0  0.1\n",
            "",
        )
        .with_file("timing.log", "elapsed 3.5\n");
        let m = d.performance[0].extract(&out).unwrap();
        assert_eq!(m, Metric::new("triad", 14000.0, "MB/s"));
        let m = d.performance[1].extract(&out).unwrap();
        assert_eq!(m.value, 3.5);
    }

    #[test]
    fn bad_pattern_is_a_load_error() {
        let json = r#"{"name": "x", "sanity": [{"kind": "found", "pattern": "("}]}"#;
        let err = TestDefinition::from_json(json).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidPattern(_)));
    }

    #[test]
    fn bad_reference_is_a_load_error() {
        let json = r#"{"name": "x", "references": {"*": {"t": [1.0, 0.5, null, "s"]}}}"#;
        assert!(matches!(
            TestDefinition::from_json(json).unwrap_err(),
            VerifyError::Json(_)
        ));
    }

    #[test]
    fn duplicate_metric_names_are_rejected() {
        let json = r#"{"name": "x", "performance": [
            {"name": "bw", "pattern": "a (\\S+)", "unit": "MB/s"},
            {"name": "bw", "pattern": "b (\\S+)", "unit": "MB/s"}
        ]}"#;
        let err = TestDefinition::from_json(json).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidDefinition(_)), "{err}");
        assert!(err.to_string().contains("`bw`"));
        assert!(err.is_definition_error());
    }

    #[test]
    fn output_files_must_stay_in_stage_dir() {
        for name in ["../secret", "/etc/passwd", "logs/../../x", ""] {
            let json = format!(
                r#"{{"name": "x", "sanity": [{{"kind": "found", "pattern": "ok",
                    "stream": {{"file": {name:?}}}}}]}}"#
            );
            let err = TestDefinition::from_json(&json).unwrap_err();
            assert!(matches!(err, VerifyError::InvalidDefinition(_)), "{name}: {err}");
        }
        let json = r#"{"name": "x", "performance": [{"name": "t", "pattern": "t (\\S+)",
            "unit": "s", "stream": {"file": "logs/./timing.log"}}]}"#;
        assert!(TestDefinition::from_json(json).is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{"name": "x", "sanitty": []}"#;
        assert!(TestDefinition::from_json(json).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, STREAM_DEF).unwrap();
        let d = TestDefinition::load(&path).unwrap();
        assert_eq!(d.performance.len(), 2);
    }
}
