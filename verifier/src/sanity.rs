// SPDX-License-Identifier: AGPL-3.0-only

//! Found / not-found conditions over captured output streams.
//!
//! Every condition in a list is evaluated; a failure never stops the
//! remaining checks, so one run reports every violated condition.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};
use crate::extract::count_matches;
use crate::tolerances::SNIPPET_CHARS;

/// Which captured text a condition or pattern reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
    /// Auxiliary output file, by name relative to the stage directory.
    File(String),
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
            Self::File(name) => write!(f, "file:{name}"),
        }
    }
}

/// File names of the captured standard streams inside a stage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLayout {
    pub stdout: String,
    pub stderr: String,
}

impl Default for StageLayout {
    fn default() -> Self {
        Self {
            stdout: String::from("job.out"),
            stderr: String::from("job.err"),
        }
    }
}

/// Text captured from one test run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub files: BTreeMap<String, String>,
}

impl CapturedOutput {
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            files: BTreeMap::new(),
        }
    }

    /// Attach an auxiliary output file.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    /// Load the standard streams and the named auxiliary files from a stage
    /// directory. Auxiliary files that do not exist are left out, so checks
    /// reading them fail with `MissingStream` at evaluation time.
    ///
    /// # Errors
    ///
    /// `Io` if either standard stream cannot be read, or an existing
    /// auxiliary file cannot be read.
    pub fn from_stage_dir<'a>(
        dir: &Path,
        layout: &StageLayout,
        files: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut out = Self::new(
            std::fs::read_to_string(dir.join(&layout.stdout))?,
            std::fs::read_to_string(dir.join(&layout.stderr))?,
        );
        for name in files {
            let path = dir.join(name);
            if path.is_file() {
                out.files
                    .insert(name.to_string(), std::fs::read_to_string(path)?);
            }
        }
        Ok(out)
    }

    /// Text of `stream`.
    ///
    /// # Errors
    ///
    /// `MissingStream` for an auxiliary file that was not captured.
    pub fn stream(&self, stream: &Stream) -> Result<&str> {
        match stream {
            Stream::Stdout => Ok(&self.stdout),
            Stream::Stderr => Ok(&self.stderr),
            Stream::File(name) => self
                .files
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| VerifyError::MissingStream(name.clone())),
        }
    }
}

/// Pattern, stream and label shared by both condition kinds.
#[derive(Debug, Clone)]
pub struct Condition {
    pub label: String,
    pub pattern: Regex,
    pub stream: Stream,
}

impl Condition {
    #[must_use]
    pub fn new(label: impl Into<String>, pattern: Regex, stream: Stream) -> Self {
        Self {
            label: label.into(),
            pattern,
            stream,
        }
    }
}

/// A sanity condition: the pattern must, or must not, occur.
#[derive(Debug, Clone)]
pub enum SanityCheck {
    Found(Condition),
    NotFound(Condition),
}

/// Kind tag recorded in outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Found,
    NotFound,
}

impl SanityCheck {
    #[must_use]
    pub const fn condition(&self) -> &Condition {
        match self {
            Self::Found(c) | Self::NotFound(c) => c,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CheckKind {
        match self {
            Self::Found(_) => CheckKind::Found,
            Self::NotFound(_) => CheckKind::NotFound,
        }
    }

    /// Evaluate against captured output.
    #[must_use]
    pub fn evaluate(&self, output: &CapturedOutput) -> SanityOutcome {
        let cond = self.condition();
        let result = output.stream(&cond.stream).and_then(|text| match self {
            Self::Found(_) => assert_found(&cond.pattern, text),
            Self::NotFound(_) => assert_not_found(&cond.pattern, text),
        });
        let reason = result.err().map(|e| match (self, output.stream(&cond.stream)) {
            (Self::NotFound(_), Ok(text)) => {
                let n = count_matches(&cond.pattern, text);
                format!("{e} ({n} occurrence{})", if n == 1 { "" } else { "s" })
            }
            _ => e.to_string(),
        });
        SanityOutcome {
            label: cond.label.clone(),
            kind: self.kind(),
            pattern: cond.pattern.as_str().to_string(),
            stream: cond.stream.clone(),
            passed: reason.is_none(),
            reason,
        }
    }
}

/// Recorded result of one sanity condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityOutcome {
    pub label: String,
    pub kind: CheckKind,
    pub pattern: String,
    pub stream: Stream,
    pub passed: bool,
    pub reason: Option<String>,
}

/// `pattern` must occur in `text`.
///
/// # Errors
///
/// `SanityViolation` carrying the tail of `text`.
pub fn assert_found(pattern: &Regex, text: &str) -> Result<()> {
    if pattern.is_match(text) {
        Ok(())
    } else {
        Err(VerifyError::SanityViolation {
            pattern: pattern.as_str().to_string(),
            snippet: tail_snippet(text),
        })
    }
}

/// `pattern` must not occur in `text`.
///
/// # Errors
///
/// `SanityViolation` carrying the line of the first offending match.
pub fn assert_not_found(pattern: &Regex, text: &str) -> Result<()> {
    match pattern.find(text) {
        None => Ok(()),
        Some(m) => Err(VerifyError::SanityViolation {
            pattern: pattern.as_str().to_string(),
            snippet: line_snippet(text, m.start()),
        }),
    }
}

/// Evaluate every check; no short-circuit.
#[must_use]
pub fn evaluate_all(checks: &[SanityCheck], output: &CapturedOutput) -> Vec<SanityOutcome> {
    checks.iter().map(|c| c.evaluate(output)).collect()
}

fn tail_snippet(text: &str) -> String {
    let trimmed = text.trim_end();
    let skip = trimmed.chars().count().saturating_sub(SNIPPET_CHARS);
    trimmed.chars().skip(skip).collect()
}

fn line_snippet(text: &str, at: usize) -> String {
    let start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let end = text[at..].find('\n').map_or(text.len(), |i| at + i);
    text[start..end].chars().take(SNIPPET_CHARS).collect()
}
