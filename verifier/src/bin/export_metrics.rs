// SPDX-License-Identifier: AGPL-3.0-only

//! Export the newest record per case and target as Prometheus text.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use hpc_verifier::{export, logging, RecordLog};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(version, about = "Convert the record log to Prometheus text exposition")]
struct Args {
    /// JSON-lines record log
    #[arg(long, env = "HPCV_RECORD_LOG")]
    record_log: PathBuf,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    logging::init();
    let args = Args::parse();

    let records = match RecordLog::new(&args.record_log).read_all() {
        Ok(r) => r,
        Err(e) => {
            error!(path = %args.record_log.display(), error = %e, "record log could not be read");
            process::exit(1);
        }
    };
    let text = export::prometheus_text(&records);

    match args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &text) {
                error!(path = %path.display(), error = %e, "could not write metrics");
                process::exit(1);
            }
            info!(records = records.len(), path = %path.display(), "metrics written");
        }
        None => print!("{text}"),
    }
}
