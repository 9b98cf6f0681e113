// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: extraction, reduction and tolerance comparison.
//!
//! Exercises the public extraction and comparison API end-to-end on
//! realistic benchmark output, plus property checks on the tolerance
//! boundary.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use hpc_verifier::patterns::{keyed_column, labelled_value};
use hpc_verifier::tolerances;
use hpc_verifier::{
    compare, extract_all, extract_single, reduce, Group, Metric, Reduction, Reference,
    VerifyError,
};
use proptest::prelude::*;
use regex::Regex;

const STREAM_OUT: &str = "\
-------------------------------------------------------------
Function    Best Rate MB/s  Avg time     Min time     Max time
Copy:           91234.5     0.017701     0.017537     0.017932
Scale:          90011.0     0.017958     0.017776     0.018127
Add:           101532.7     0.023851     0.023638     0.024015
Triad:          14000.0     0.171700     0.171428     0.172031
Triad:          14100.0     0.170500     0.170222     0.171100
-------------------------------------------------------------
Solution Validates: avg error less than 1.000000e-13 on all three arrays
";

fn triad_pattern() -> Regex {
    Regex::new(r"Triad:\s+(?P<triad>\S+)\s+\S+").unwrap()
}

#[test]
fn absent_pattern_is_not_found() {
    let re = Regex::new(r"Fused:\s+(\S+)").unwrap();
    let err = extract_single::<f64>(&re, STREAM_OUT, &Group::Index(1)).unwrap_err();
    assert!(matches!(err, VerifyError::NotFound { .. }), "{err}");
}

#[test]
fn extract_all_is_ordered_and_restartable() {
    let re = triad_pattern();
    let first = extract_all::<f64>(&re, STREAM_OUT, &Group::from("triad")).unwrap();
    let again = first.restart();
    let values: Vec<f64> = first.map(Result::unwrap).collect();
    assert_eq!(values, vec![14000.0, 14100.0]);
    let replay: Vec<f64> = again.map(Result::unwrap).collect();
    assert_eq!(replay, values);
}

#[test]
fn undefined_group_is_a_definition_error() {
    let re = triad_pattern();
    let err = extract_all::<f64>(&re, STREAM_OUT, &Group::from("bogus")).unwrap_err();
    assert!(matches!(err, VerifyError::MissingGroup { .. }));
    assert!(err.is_definition_error());
}

#[test]
fn triad_end_to_end_reports_deviation() {
    let re = triad_pattern();
    let values = extract_all::<f64>(&re, STREAM_OUT, &Group::from("triad")).unwrap();
    let triad = values.aggregate(Reduction::Min).unwrap();
    assert_eq!(triad, 14000.0);

    let reference = Reference::relative(
        122_000.0,
        Some(tolerances::STANDARD_LOWER),
        Some(tolerances::STANDARD_UPPER),
        "MB/s",
    )
    .unwrap();
    let c = compare(&Metric::new("triad", triad, "MB/s"), &reference).unwrap();
    assert!(!c.passed);
    let (lo, _) = reference.bounds();
    assert_eq!(c.deviation, Some(14000.0 - lo.unwrap()));
    assert!((c.deviation.unwrap() + 101_900.0).abs() < 1e-6);
    assert!(c.describe().contains("off by"));
}

#[test]
fn unit_mismatch_beats_numbers() {
    let reference = Reference::relative(14000.0, Some(-0.05), Some(0.05), "GB/s").unwrap();
    let err = compare(&Metric::new("triad", 14000.0, "MB/s"), &reference).unwrap_err();
    assert!(matches!(err, VerifyError::UnitMismatch { .. }));
}

#[test]
fn lower_only_reference() {
    let reference = Reference::relative(100.0, Some(tolerances::LOOSE_LOWER), None, "s").unwrap();
    let check = |v: f64| compare(&Metric::new("t", v, "s"), &reference).unwrap().passed;
    assert!(!check(89.0));
    assert!(check(90.0));
    assert!(check(1000.0));
}

#[test]
fn asymmetric_reference() {
    let reference = Reference::relative(100.0, Some(-0.10), Some(0.05), "s").unwrap();
    let check = |v: f64| compare(&Metric::new("t", v, "s"), &reference).unwrap().passed;
    assert!(check(105.0));
    assert!(!check(105.5));
    assert!(check(90.0));
}

#[test]
fn empty_reduction_fails() {
    let err = reduce(Vec::new(), Reduction::Sum).unwrap_err();
    assert!(matches!(err, VerifyError::EmptySequence { .. }));
    assert_eq!(reduce([3.0, 1.0, 2.0], Reduction::Max).unwrap(), 3.0);
    assert_eq!(reduce([3.0, 1.0, 2.0], Reduction::Mean).unwrap(), 2.0);
}

#[test]
fn pattern_helpers_read_benchmark_tables() {
    let re = Regex::new(&labelled_value("Add:", "add")).unwrap();
    let add: f64 = extract_single(&re, STREAM_OUT, &Group::from("add")).unwrap();
    assert_eq!(add, 101_532.7);

    let osu = "# Size  Bandwidth (MB/s)\n256  1024.50\n2560  9800.00\n";
    let re = Regex::new(&keyed_column("256", 1, "bw")).unwrap();
    let bw: f64 = extract_single(&re, osu, &Group::from("bw")).unwrap();
    assert_eq!(bw, 1024.5);
}

proptest! {
    #[test]
    fn k_matches_yield_k_values(values in prop::collection::vec(0.0f64..1e9, 0..16)) {
        let text: String = values.iter().map(|v| format!("t = {v}\n")).collect();
        let re = Regex::new(r"t = (\S+)").unwrap();
        let got: Vec<f64> = extract_all::<f64>(&re, &text, &Group::Index(1))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        prop_assert_eq!(got, values);
    }

    #[test]
    fn lower_boundary_is_inclusive(
        expected in -1e6f64..1e6,
        lower in -0.9f64..0.0,
    ) {
        prop_assume!(expected.abs() > 1e-3);
        let reference = Reference::relative(expected, Some(lower), None, "u").unwrap();
        let (lo, hi) = reference.bounds();
        prop_assert!(hi.is_none());
        let lo = lo.unwrap();
        prop_assert!(lo <= expected);
        let at = compare(&Metric::new("m", lo, "u"), &reference).unwrap();
        prop_assert!(at.passed);
        let below = compare(&Metric::new("m", lo - expected.abs() * 1e-3, "u"), &reference).unwrap();
        prop_assert!(!below.passed);
        prop_assert!(below.deviation.unwrap() < 0.0);
    }

    #[test]
    fn open_reference_accepts_everything_finite(value in -1e12f64..1e12) {
        let reference = Reference::relative(1.0, None, None, "u").unwrap();
        prop_assert!(compare(&Metric::new("m", value, "u"), &reference).unwrap().passed);
    }
}
