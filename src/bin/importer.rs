// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! `importer --input <path> --password <secret>`: runs every import in an
//! [`sfc_index::job::IngestJob`].

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use sfc_index::ingest::ingest_files;
use sfc_index::job::IngestJob;
use sfc_index::store::PostgresBlockStore;

#[derive(Parser)]
#[command(about = "Ingest point files into spatial-index datasets")]
struct Args {
    /// Path to a JSON ingest job description.
    #[arg(long)]
    input: String,
    /// Database password, overriding the job description's own.
    #[arg(long)]
    password: Option<String>,
}

fn run(args: Args) -> sfc_index::Result<()> {
    let text = std::fs::read_to_string(&args.input)?;
    let mut job: IngestJob = serde_json::from_str(&text)?;
    if let Some(password) = args.password {
        job.config.password = password;
    }

    let mut store = PostgresBlockStore::connect(&job.config)?;

    for (dataset_name, entry) in &job.imports {
        let spec = entry.to_ingest_spec(dataset_name)?;
        let descriptor = ingest_files(&spec, &mut store)?;
        info!(
            "dataset {} ready: {} points, split H={} T={}",
            descriptor.name,
            descriptor.point_count,
            descriptor.split.head_bits,
            descriptor.split.tail_bits
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
