// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for output verification.
//!
//! Each failure mode of extraction, comparison and sanity checking is its own
//! variant so the aggregator can tell a missing pattern apart from a broken
//! test definition or an out-of-tolerance measurement.

use thiserror::Error;

/// Errors arising while extracting, comparing or checking captured output.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A required pattern did not occur in the searched text.
    #[error("pattern `{pattern}` not found")]
    NotFound { pattern: String },

    /// A captured substring could not be converted to the requested type.
    #[error("cannot convert `{value}` to {target}")]
    Conversion { value: String, target: &'static str },

    /// The pattern matched but does not define the requested capture group.
    #[error("pattern `{pattern}` has no capture group `{group}`")]
    MissingGroup { pattern: String, group: String },

    /// Metric and reference disagree on the unit.
    #[error("unit mismatch for `{metric}`: reference is `{expected}`, metric is `{found}`")]
    UnitMismatch {
        metric: String,
        expected: String,
        found: String,
    },

    /// An aggregation was requested over zero extracted values.
    #[error("no values extracted for `{pattern}`")]
    EmptySequence { pattern: String },

    /// An extracted metric is NaN or infinite.
    #[error("metric `{metric}` is not finite ({value})")]
    NonFinite { metric: String, value: f64 },

    /// A found / not-found condition did not hold.
    #[error("sanity violation for `{pattern}`; context: {snippet:?}")]
    SanityViolation { pattern: String, snippet: String },

    /// A named auxiliary output file was not captured.
    #[error("output stream `{0}` was not captured")]
    MissingStream(String),

    /// Pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Reference tuple is inconsistent (wrong tolerance signs, inverted bounds).
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Definition is structurally inconsistent (duplicate metric names,
    /// output file names escaping the stage directory).
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// Reading a definition, output file or record log failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Definition, manifest or record JSON is malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    /// Whether this error indicates a broken test definition rather than a
    /// measurement or output failure.
    #[must_use]
    pub const fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Self::Conversion { .. }
                | Self::MissingGroup { .. }
                | Self::InvalidPattern(_)
                | Self::InvalidReference(_)
                | Self::InvalidDefinition(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, VerifyError>;
