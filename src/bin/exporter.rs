// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! `exporter --input <path> --password <secret>`: runs an
//! [`sfc_index::job::ExportJob`], dumping each named dataset whole to
//! `<name>.las`.

use std::process::ExitCode;

use clap::Parser;
use las::{Builder, Point, Writer};
use log::{error, info};
use sfc_index::job::ExportJob;
use sfc_index::morton;
use sfc_index::store::PostgresBlockStore;
use sfc_index::BlockStore;

#[derive(Parser)]
#[command(about = "Export spatial-index datasets to LAS files")]
struct Args {
    /// Path to a JSON export job description.
    #[arg(long)]
    input: String,
    /// Database password, overriding the job description's own.
    #[arg(long)]
    password: Option<String>,
}

fn run(args: Args) -> sfc_index::Result<()> {
    let text = std::fs::read_to_string(&args.input)?;
    let mut job: ExportJob = serde_json::from_str(&text)?;
    if let Some(password) = args.password {
        job.config.password = password;
    }

    let mut store = PostgresBlockStore::connect(&job.config)?;

    for (output_name, entry) in &job.queries {
        let descriptor = store.load_descriptor(&entry.source_dataset)?;
        let blocks = store.scan_all(&entry.source_dataset)?;

        let mut builder = Builder::default();
        builder.point_format.has_color = false;
        let header = builder
            .into_header()
            .map_err(|e| sfc_index::Error::Store(e.to_string()))?;

        let out_path = format!("{output_name}.las");
        let mut writer = Writer::from_path(&out_path, header)
            .map_err(|e| sfc_index::Error::Store(e.to_string()))?;

        let mut rows = 0u64;
        for block in &blocks {
            for (tail, z) in block.tails.iter().zip(&block.zs) {
                let key = descriptor.split.join_key(block.head, *tail);
                let (qx, qy) = morton::decode(key);
                let x = descriptor.offset_x + f64::from(qx) * descriptor.scale_x;
                let y = descriptor.offset_y + f64::from(qy) * descriptor.scale_y;

                let mut point = Point::default();
                point.x = x;
                point.y = y;
                point.z = *z;
                writer.write_point(point)?;
                rows += 1;
            }
        }

        info!(
            "exported {rows} points from dataset {} to {out_path}",
            entry.source_dataset
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
