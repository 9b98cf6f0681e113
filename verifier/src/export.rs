// SPDX-License-Identifier: AGPL-3.0-only

//! Prometheus text exposition of verification records.
//!
//! Only the newest record per (case, system, partition, scale) is exported,
//! so a log holding many runs still yields one sample per series.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::report::VerificationResult;
use crate::validation::MetricStatus;

/// Metric-name prefix for every exported series.
pub const PREFIX: &str = "hpcv";

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn labels(pairs: &[(&str, &str)]) -> String {
    let body: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape(v)))
        .collect();
    format!("{{{}}}", body.join(","))
}

fn sample(value: f64) -> String {
    if value.is_nan() {
        String::from("NaN")
    } else if value.is_infinite() {
        String::from(if value > 0.0 { "+Inf" } else { "-Inf" })
    } else {
        format!("{value}")
    }
}

/// Newest result per series key, in key order.
#[must_use]
pub fn latest(results: &[VerificationResult]) -> Vec<&VerificationResult> {
    let mut by_key: BTreeMap<(&str, &str, &str, &str), &VerificationResult> = BTreeMap::new();
    for r in results {
        let key = (
            r.name(),
            r.target().system.as_str(),
            r.target().partition.as_str(),
            r.scale().unwrap_or(""),
        );
        by_key
            .entry(key)
            .and_modify(|cur| {
                if r.timestamp() >= cur.timestamp() {
                    *cur = r;
                }
            })
            .or_insert(r);
    }
    by_key.into_values().collect()
}

/// Render `results` as Prometheus text exposition.
#[must_use]
pub fn prometheus_text(results: &[VerificationResult]) -> String {
    let latest = latest(results);
    let mut out = String::new();

    let mut family = |name: &str, help: &str, rows: Vec<(String, f64)>| {
        if rows.is_empty() {
            return;
        }
        let _ = writeln!(out, "# HELP {PREFIX}_{name} {help}");
        let _ = writeln!(out, "# TYPE {PREFIX}_{name} gauge");
        for (lbl, v) in rows {
            let _ = writeln!(out, "{PREFIX}_{name}{lbl} {}", sample(v));
        }
    };

    let base = |r: &VerificationResult| {
        vec![
            ("case", r.name().to_string()),
            ("system", r.target().system.clone()),
            ("partition", r.target().partition.clone()),
            ("scale", r.scale().unwrap_or("").to_string()),
        ]
    };
    let render = |pairs: Vec<(&str, String)>| {
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        labels(&refs)
    };

    let passed = latest
        .iter()
        .map(|r| (render(base(*r)), f64::from(u8::from(r.passed()))))
        .collect();
    family("case_passed", "Overall verdict of the newest run (1 = pass).", passed);

    let mut sanity = Vec::new();
    let mut values = Vec::new();
    let mut metric_passed = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    for r in &latest {
        for s in r.sanity() {
            let mut l = base(*r);
            l.push(("check", s.label.clone()));
            sanity.push((render(l), f64::from(u8::from(s.passed))));
        }
        for m in r.metrics() {
            let mut l = base(*r);
            l.push(("metric", m.name.clone()));
            l.push(("unit", m.unit.clone().unwrap_or_default()));
            let lbl = render(l);
            if let Some(v) = m.value {
                values.push((lbl.clone(), v));
            }
            if m.status != MetricStatus::Skipped {
                let ok = m.status == MetricStatus::Pass;
                metric_passed.push((lbl.clone(), f64::from(u8::from(ok))));
            }
            if let Some(c) = &m.comparison {
                if let Some(lo) = c.lower_bound {
                    lower.push((lbl.clone(), lo));
                }
                if let Some(hi) = c.upper_bound {
                    upper.push((lbl, hi));
                }
            }
        }
    }
    family("sanity_passed", "Sanity condition outcome (1 = pass).", sanity);
    family("metric_value", "Extracted performance metric.", values);
    family("metric_passed", "Metric within reference bounds (1 = pass).", metric_passed);
    family("metric_lower_bound", "Lower reference bound.", lower);
    family("metric_upper_bound", "Upper reference bound.", upper);
    out
}
