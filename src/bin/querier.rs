// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! `querier --input <path> --password <secret>`: runs every named query in
//! an [`sfc_index::job::QueryJob`] and prints a `{name: [points...]}` JSON
//! object to stdout.

use std::collections::BTreeMap;
use std::process::ExitCode;

use clap::Parser;
use log::error;
use serde::Serialize;
use sfc_index::job::QueryJob;
use sfc_index::store::PostgresBlockStore;
use sfc_index::{BlockStore, Point, QueryExecutor};

#[derive(Parser)]
#[command(about = "Query spatial-index datasets")]
struct Args {
    /// Path to a JSON query job description.
    #[arg(long)]
    input: String,
    /// Database password, overriding the job description's own.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Serialize)]
struct PointJson {
    x: f64,
    y: f64,
    z: f64,
}

impl From<Point> for PointJson {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y, z: p.z }
    }
}

fn run(args: Args) -> sfc_index::Result<()> {
    let text = std::fs::read_to_string(&args.input)?;
    let mut job: QueryJob = serde_json::from_str(&text)?;
    if let Some(password) = args.password {
        job.config.password = password;
    }

    let mut store = PostgresBlockStore::connect(&job.config)?;
    let mut results: BTreeMap<String, Vec<PointJson>> = BTreeMap::new();

    for (query_name, entry) in &job.queries {
        let descriptor = store.load_descriptor(&entry.source_dataset)?;
        let executor = QueryExecutor::new(&descriptor);
        let geometry = entry.to_geometry()?;

        let mut points = executor.query(&mut store, &geometry)?;
        if let Some(maxz) = entry.maxz {
            points.retain(|p| p.z <= maxz);
        }
        if let Some(minz) = entry.minz {
            points.retain(|p| p.z >= minz);
        }

        results.insert(
            query_name.clone(),
            points.into_iter().map(PointJson::from).collect(),
        );
    }

    println!("{}", serde_json::to_string(&results)?);
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
