// SPDX-License-Identifier: AGPL-3.0-only

//! Verify one finished regression run.
//!
//! Reads the test definition and the stage directory, evaluates every
//! sanity condition and performance metric, prints the summary and appends
//! the result to the record log.
//!
//! Exit code 0 only if the case passes; 1 on any failure or load error.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use hpc_verifier::evaluate::CaseRequest;
use hpc_verifier::sanity::StageLayout;
use hpc_verifier::{logging, RecordLog};
use tracing::error;

#[derive(Debug, Parser)]
#[command(version, about = "Verify the captured output of one regression run")]
struct Args {
    /// JSON test definition
    #[arg(short, long)]
    definition: PathBuf,

    /// Directory holding the run's captured output
    #[arg(short = 'o', long)]
    stage_dir: PathBuf,

    #[arg(long, env = "HPCV_SYSTEM")]
    system: String,

    #[arg(long, env = "HPCV_PARTITION", default_value = "*")]
    partition: String,

    /// Reference scale (e.g. node-count class)
    #[arg(long)]
    scale: Option<String>,

    /// Unique id of this run; defaults to `<definition stem>-<UTC time>`
    #[arg(long)]
    run_id: Option<String>,

    /// JSON-lines record log to append to
    #[arg(long, env = "HPCV_RECORD_LOG")]
    record_log: Option<PathBuf>,

    #[arg(long, default_value = "job.out")]
    stdout_file: String,

    #[arg(long, default_value = "job.err")]
    stderr_file: String,
}

fn default_run_id(definition: &std::path::Path) -> String {
    let stem = definition
        .file_stem()
        .map_or_else(|| String::from("case"), |s| s.to_string_lossy().into_owned());
    format!("{stem}-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}

fn main() {
    logging::init();
    let args = Args::parse();

    let request = CaseRequest {
        run_id: args
            .run_id
            .clone()
            .unwrap_or_else(|| default_run_id(&args.definition)),
        definition: args.definition,
        stage_dir: args.stage_dir,
        system: args.system,
        partition: args.partition,
        scale: args.scale,
        layout: StageLayout {
            stdout: args.stdout_file,
            stderr: args.stderr_file,
        },
    };

    let result = match request.run() {
        Ok(r) => r,
        Err(e) => {
            error!(run_id = %request.run_id, error = %e, "case could not be evaluated");
            eprintln!("  ERROR: {e}");
            process::exit(1);
        }
    };
    result.print_summary();

    if let Some(path) = args.record_log {
        if let Err(e) = RecordLog::new(path).append(&result) {
            error!(error = %e, "could not append record");
            process::exit(1);
        }
    }

    process::exit(i32::from(!result.passed()));
}
