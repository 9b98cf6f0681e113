// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized tolerance fractions and diagnostic limits.
//!
//! Reference tables in test definitions may use any fraction, but the common
//! ones are named here so definitions built in code and tests share the same
//! numbers instead of ad-hoc literals.
//!
//! | Category | Lower | Upper | Typical use |
//! |----------|-------|-------|-------------|
//! | Tight | -2% | +2% | deterministic kernels (DGEMM, HPL) |
//! | Standard | -5% | +5% | memory bandwidth (STREAM), OSU bandwidth |
//! | Loose | -10% | +10% | network latency, I/O, application runtimes |
//! | Regression-only | -10% | unbounded | throughput that may improve freely |

// ═══════════════════════════════════════════════════════════════════
// Relative tolerance fractions
// ═══════════════════════════════════════════════════════════════════

/// Lower fraction for deterministic compute kernels.
pub const TIGHT_LOWER: f64 = -0.02;

/// Upper fraction for deterministic compute kernels.
pub const TIGHT_UPPER: f64 = 0.02;

/// Lower fraction for bandwidth benchmarks.
///
/// STREAM triad on a quiet node varies by ~2-3% run to run; 5% leaves
/// headroom for NUMA placement noise.
pub const STANDARD_LOWER: f64 = -0.05;

/// Upper fraction for bandwidth benchmarks.
pub const STANDARD_UPPER: f64 = 0.05;

/// Lower fraction for latency, I/O and full-application metrics.
pub const LOOSE_LOWER: f64 = -0.10;

/// Upper fraction for latency, I/O and full-application metrics.
pub const LOOSE_UPPER: f64 = 0.10;

// ═══════════════════════════════════════════════════════════════════
// Diagnostics
// ═══════════════════════════════════════════════════════════════════

/// Maximum characters of searched text carried in a sanity violation.
pub const SNIPPET_CHARS: usize = 240;

/// Expected values with magnitude below this are treated as zero when a
/// deviation is expressed as a fraction of the expected value.
pub const NEAR_ZERO_EXPECTED: f64 = 1e-300;
