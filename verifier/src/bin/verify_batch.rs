// SPDX-License-Identifier: AGPL-3.0-only

//! Verify every case listed in a manifest.
//!
//! Cases are evaluated in parallel. A case that cannot be loaded is reported
//! as an error without affecting the others.
//!
//! Exit code is 0 only if ALL cases pass.
//!
//! ```json
//! {"cases": [{"run_id": "stream-42", "definition": "defs/stream.json",
//!             "stage_dir": "stage/stream", "system": "daint", "partition": "gpu"}]}
//! ```

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use hpc_verifier::{evaluate_batch, logging, Manifest, RecordLog};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(version, about = "Verify every regression run listed in a manifest")]
struct Args {
    /// JSON manifest of cases
    manifest: PathBuf,

    /// JSON-lines record log to append to
    #[arg(long, env = "HPCV_RECORD_LOG")]
    record_log: Option<PathBuf>,

    /// Print only the per-case status lines
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    logging::init();
    let args = Args::parse();

    let manifest = match Manifest::load(&args.manifest) {
        Ok(m) => m,
        Err(e) => {
            error!(path = %args.manifest.display(), error = %e, "manifest could not be read");
            process::exit(1);
        }
    };

    println!("═══════════════════════════════════════════════════════════");
    println!("  Regression verification: {} cases", manifest.cases.len());
    println!("═══════════════════════════════════════════════════════════\n");

    let t_total = Instant::now();
    let outcomes = evaluate_batch(&manifest.cases);
    let mut log = args.record_log.map(RecordLog::new);

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut errors = 0usize;
    let mut failures: Vec<String> = Vec::new();

    for outcome in &outcomes {
        match outcome {
            Ok(result) => {
                if result.passed() {
                    println!("  PASS  {:<30} {}", result.name(), result.target());
                    passed += 1;
                } else {
                    println!("  FAIL  {:<30} {}", result.name(), result.target());
                    failed += 1;
                    failures.push(result.run_id().to_string());
                }
                if !args.quiet {
                    for line in result.render().lines() {
                        println!("        {line}");
                    }
                }
                if let Some(log) = &mut log {
                    if let Err(e) = log.append(result) {
                        error!(run_id = result.run_id(), error = %e, "could not append record");
                        errors += 1;
                    }
                }
            }
            Err(failure) => {
                println!("  ERROR {:<30} ({})", failure.run_id, failure.error);
                errors += 1;
                failures.push(failure.run_id.clone());
            }
        }
    }

    let total_time = t_total.elapsed().as_secs_f64();
    info!(passed, failed, errors, seconds = total_time, "batch verified");

    println!("\n═══════════════════════════════════════════════════════════");
    println!("  TOTAL: {passed} passed, {failed} failed, {errors} errors ({total_time:.1}s)");
    if !failures.is_empty() {
        println!("  FAILURES: {}", failures.join(", "));
    }

    if failed == 0 && errors == 0 {
        println!("  ALL CASES PASSED");
        println!("═══════════════════════════════════════════════════════════");
        process::exit(0);
    } else {
        println!("  SOME CASES FAILED");
        println!("═══════════════════════════════════════════════════════════");
        process::exit(1);
    }
}
