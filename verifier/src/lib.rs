// SPDX-License-Identifier: AGPL-3.0-only

//! hpc-verifier: result verification for HPC regression tests
//!
//! Turns the captured output of a finished regression run into a verdict:
//! sanity conditions over the output streams, performance metrics parsed by
//! pattern and compared against per-system reference values, and a sealed
//! result appended to a JSON-lines record log.
//!
//! ## Modules
//!   - `extract`: pattern extraction (`extract_single`, `extract_all`, `reduce`)
//!   - `patterns`: anchored pattern builders for common output layouts
//!   - `compare`: asymmetric-tolerance comparison against a reference
//!   - `reference`: reference values and per-target tables
//!   - `sanity`: found / not-found conditions over captured streams
//!   - `definition`: declarative JSON test-case definitions
//!   - `validation`: per-case harness that records every outcome
//!   - `report`: sealed `VerificationResult` and the record log
//!   - `evaluate`: single-case and parallel batch evaluation
//!   - `export`: Prometheus text exposition of stored records
//!   - `tolerances`: named tolerance fractions and limits
//!
//! ## Binaries
//!   - `verify_case`: one case, exit code 0/1
//!   - `verify_batch`: every case in a manifest, in parallel
//!   - `export_metrics`: record log → Prometheus text

#![forbid(unsafe_code)]
#![deny(clippy::expect_used, clippy::unwrap_used)]

pub mod compare;
pub mod definition;
pub mod error;
pub mod evaluate;
pub mod export;
pub mod extract;
pub mod logging;
pub mod patterns;
pub mod reference;
pub mod report;
pub mod sanity;
pub mod tolerances;
pub mod validation;

pub use compare::{compare, Comparison, Metric};
pub use definition::TestDefinition;
pub use error::{Result, VerifyError};
pub use evaluate::{evaluate, evaluate_batch, CaseRequest, Manifest};
pub use extract::{extract_all, extract_single, reduce, Group, Reduction};
pub use reference::{Reference, ReferenceTable, Target};
pub use report::{RecordLog, VerificationResult};
pub use sanity::{assert_found, assert_not_found, CapturedOutput, SanityCheck};
