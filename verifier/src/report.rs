// SPDX-License-Identifier: AGPL-3.0-only

//! Verification results, human summaries, and the JSON record log.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::reference::Target;
use crate::sanity::SanityOutcome;
use crate::validation::{MetricOutcome, MetricStatus};

/// Sealed outcome of one case. Built once by
/// [`crate::validation::ValidationHarness::finish`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    name: String,
    run_id: String,
    target: Target,
    scale: Option<String>,
    timestamp: DateTime<Utc>,
    sanity: Vec<SanityOutcome>,
    metrics: Vec<MetricOutcome>,
    passed: bool,
}

impl VerificationResult {
    pub(crate) fn new(
        name: String,
        run_id: String,
        target: Target,
        scale: Option<String>,
        sanity: Vec<SanityOutcome>,
        metrics: Vec<MetricOutcome>,
        passed: bool,
    ) -> Self {
        Self {
            name,
            run_id,
            target,
            scale,
            timestamp: Utc::now(),
            sanity,
            metrics,
            passed,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn scale(&self) -> Option<&str> {
        self.scale.as_deref()
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn sanity(&self) -> &[SanityOutcome] {
        &self.sanity
    }

    #[must_use]
    pub fn metrics(&self) -> &[MetricOutcome] {
        &self.metrics
    }

    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Labels of failing sanity checks and names of failing metrics.
    #[must_use]
    pub fn failures(&self) -> Vec<&str> {
        let sanity = self
            .sanity
            .iter()
            .filter(|s| !s.passed)
            .map(|s| s.label.as_str());
        let metrics = self
            .metrics
            .iter()
            .filter(|m| !m.status.is_acceptable())
            .map(|m| m.name.as_str());
        sanity.chain(metrics).collect()
    }

    /// Human-readable summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut s = String::new();
        let checked = self.sanity.len()
            + self
                .metrics
                .iter()
                .filter(|m| m.status != MetricStatus::Skipped)
                .count();
        let failed = self.failures().len();
        let scale = self
            .scale
            .as_deref()
            .map_or_else(String::new, |sc| format!(" @{sc}"));
        let _ = writeln!(
            s,
            "═══ {} on {}{scale} [{}]: {}/{checked} checks passed ═══",
            self.name,
            self.target,
            self.run_id,
            checked - failed
        );

        for o in &self.sanity {
            let icon = if o.passed { "✓" } else { "✗" };
            let _ = write!(s, "  {icon} sanity {}: {:?} in {}", o.label, o.kind, o.stream);
            if let Some(reason) = &o.reason {
                let _ = write!(s, ": {reason}");
            }
            s.push('\n');
        }

        for m in &self.metrics {
            let icon = match m.status {
                MetricStatus::Pass => "✓",
                MetricStatus::Skipped => "·",
                MetricStatus::Fail | MetricStatus::Error => "✗",
            };
            let line = match (&m.comparison, &m.reason) {
                (Some(c), _) => c.describe(),
                (None, Some(reason)) => format!("{}: {reason}", m.name),
                (None, None) => m.name.clone(),
            };
            let _ = writeln!(s, "  {icon} perf {line}");
            if m.status == MetricStatus::Skipped {
                if let (Some(v), Some(u)) = (m.value, &m.unit) {
                    let _ = writeln!(s, "      value={v:.6e} {u} (no reference)");
                }
            }
        }

        if self.passed {
            s.push_str("ALL CHECKS PASSED\n");
        } else {
            let _ = writeln!(s, "FAILED CHECKS: {}", self.failures().join(", "));
        }
        s
    }

    /// Print the summary to stdout.
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.render());
    }
}

#[derive(Deserialize)]
struct RunIdOnly {
    run_id: String,
}

/// Append-only JSON-lines log of verification results.
///
/// One line per result. Appending a result whose run id is already in the
/// log does nothing, so re-reporting a run is harmless. Run ids are read
/// from the file once, on first use, and tracked in memory afterwards;
/// lines written by another process after that are not seen.
#[derive(Debug, Clone)]
pub struct RecordLog {
    path: PathBuf,
    known: Option<HashSet<String>>,
}

impl RecordLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            known: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan_run_ids(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let reader = BufReader::new(std::fs::File::open(&self.path)?);
        let mut ids = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let rec: RunIdOnly = serde_json::from_str(&line)?;
            ids.insert(rec.run_id);
        }
        Ok(ids)
    }

    fn run_ids(&mut self) -> Result<&mut HashSet<String>> {
        if self.known.is_none() {
            let ids = self.scan_run_ids()?;
            debug!(path = %self.path.display(), runs = ids.len(), "record log scanned");
            self.known = Some(ids);
        }
        Ok(self.known.get_or_insert_with(HashSet::new))
    }

    /// Whether a result with `run_id` has been appended.
    ///
    /// # Errors
    ///
    /// `Io` / `Json` if the existing log cannot be read.
    pub fn contains(&mut self, run_id: &str) -> Result<bool> {
        Ok(self.run_ids()?.contains(run_id))
    }

    /// Append `result` unless its run id is already logged. Returns whether
    /// a line was written.
    ///
    /// # Errors
    ///
    /// `Io` if the directory or file cannot be written, `Json` if the
    /// existing log is malformed.
    pub fn append(&mut self, result: &VerificationResult) -> Result<bool> {
        if self.contains(result.run_id())? {
            debug!(run_id = result.run_id(), "record already logged");
            return Ok(false);
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut line = serde_json::to_string(result)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        self.run_ids()?.insert(result.run_id().to_string());
        info!(run_id = result.run_id(), path = %self.path.display(), "record appended");
        Ok(true)
    }

    /// Every result in the log, in append order.
    ///
    /// # Errors
    ///
    /// `Io` / `Json` if the log cannot be read or a line is malformed.
    pub fn read_all(&self) -> Result<Vec<VerificationResult>> {
        let reader = BufReader::new(std::fs::File::open(&self.path)?);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }
}
