// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Ingest orchestration: reads one or more point files, quantizes every
//! point onto a shared grid, and hands the result to a [`BlockBuilder`]
//! and then a [`BlockStore`].

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::builder::{BlockBuilder, Quantizer};
use crate::error::{Error, Result};
use crate::metadata::DatasetDescriptor;
use crate::reader::{LasPointReader, PointFileReader};
use crate::split::compute_split;
use crate::store::BlockStore;

/// Where an import's input files come from (spec §6 `"mode"` field of an
/// import job).
#[derive(Clone, Debug, PartialEq)]
pub enum SourceMode {
    /// `path` names a single point file.
    File,
    /// `path` names a directory; every regular file in it is ingested.
    Dir,
}

/// Parameters one named import in an ingest job provides.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestSpec {
    /// Dataset name.
    pub dataset_name: String,
    /// Source mode.
    pub mode: SourceMode,
    /// File or directory path, per `mode`.
    pub path: PathBuf,
    /// Spatial reference identifier, carried through opaque to the engine.
    pub srid: i32,
    /// Head/tail ratio passed to [`compute_split`].
    pub ratio: f64,
}

impl IngestSpec {
    /// Resolves `path`/`mode` into the concrete list of files to read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadInputFile`] if `path` does not exist or the
    /// directory cannot be listed.
    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        match self.mode {
            SourceMode::File => Ok(vec![self.path.clone()]),
            SourceMode::Dir => {
                let mut files = Vec::new();
                for entry in fs::read_dir(&self.path)
                    .map_err(|e| Error::BadInputFile(format!("{}: {e}", self.path.display())))?
                {
                    let entry = entry
                        .map_err(|e| Error::BadInputFile(format!("{}: {e}", self.path.display())))?;
                    if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                        files.push(entry.path());
                    }
                }
                files.sort();
                Ok(files)
            }
        }
    }
}

/// Ingests every file `spec` resolves to into one dataset.
///
/// The dataset's quantization offset and scale are taken from the first
/// file's own header (so stored keys decode back to the file's native
/// integer grid exactly); every subsequent file must declare the same
/// scale, or the import fails with [`Error::HeterogeneousDataset`].
///
/// # Errors
///
/// Returns [`Error::BadInputFile`] if a file cannot be read,
/// [`Error::HeterogeneousDataset`] if the files were not captured at a
/// consistent native resolution, or propagates quantization/store errors.
pub fn ingest_files(spec: &IngestSpec, store: &mut impl BlockStore) -> Result<DatasetDescriptor> {
    let paths = spec.input_files()?;
    if paths.is_empty() {
        return Err(Error::BadInputFile(format!(
            "no input files found at {}",
            spec.path.display()
        )));
    }

    let mut point_count: u64 = 0;
    let mut bounds = (
        f64::INFINITY,
        f64::INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
    );
    let mut quantizer: Option<Quantizer> = None;

    for path in &paths {
        let mut reader = LasPointReader::open(path)?;
        let header = reader.header()?;
        point_count += header.point_count;

        bounds.0 = bounds.0.min(header.bounds.0);
        bounds.1 = bounds.1.min(header.bounds.1);
        bounds.2 = bounds.2.min(header.bounds.2);
        bounds.3 = bounds.3.max(header.bounds.3);
        bounds.4 = bounds.4.max(header.bounds.4);
        bounds.5 = bounds.5.max(header.bounds.5);

        let native = native_transform(path)?;
        match &quantizer {
            None => quantizer = Some(native),
            Some(expected) => {
                if !quantizer_compatible(expected, &native) {
                    return Err(Error::HeterogeneousDataset {
                        dataset: spec.dataset_name.clone(),
                    });
                }
            }
        }
    }
    let quantizer = quantizer.ok_or_else(|| {
        Error::BadInputFile(format!("no input files found at {}", spec.path.display()))
    })?;

    let (qx_max, qy_max) = quantizer.quantize(bounds.3, bounds.4);
    let split = compute_split(qx_max, qy_max, spec.ratio)?;

    let mut builder = BlockBuilder::new(split);
    for path in &paths {
        let mut reader = LasPointReader::open(path)?;
        reader.for_each_point(&mut |point| {
            let (x, y) = quantizer.quantize(point.x, point.y);
            if let Err(e) = builder.push(x, y, point.z) {
                log::warn!("dropping point outside the quantized domain: {e}");
            }
        })?;
    }

    let blocks = builder.finish()?;

    let descriptor = DatasetDescriptor {
        name: spec.dataset_name.clone(),
        srid: spec.srid,
        offset_x: quantizer.offset_x,
        offset_y: quantizer.offset_y,
        offset_z: 0.0,
        scale_x: quantizer.scale_x,
        scale_y: quantizer.scale_y,
        x_max: qx_max,
        y_max: qy_max,
        split,
        point_count,
        bounds,
    };
    descriptor.validate()?;

    store.create_dataset(&descriptor)?;
    store.append_blocks(&descriptor.name, &blocks)?;

    info!(
        "ingested {} points from {} file(s) into dataset {}",
        point_count,
        paths.len(),
        descriptor.name
    );

    Ok(descriptor)
}

/// The quantization grid implied by a file's own header scale/offset.
fn native_transform(path: &Path) -> Result<Quantizer> {
    let reader = las::Reader::from_path(path)
        .map_err(|e| Error::BadInputFile(format!("{}: {e}", path.display())))?;
    let transforms = reader.header().transforms();
    Ok(Quantizer {
        offset_x: transforms.x.offset,
        offset_y: transforms.y.offset,
        scale_x: transforms.x.scale,
        scale_y: transforms.y.scale,
    })
}

fn quantizer_compatible(a: &Quantizer, b: &Quantizer) -> bool {
    let close = |x: f64, y: f64| (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0);
    close(a.offset_x, b.offset_x)
        && close(a.offset_y, b.offset_y)
        && close(a.scale_x, b.scale_x)
        && close(a.scale_y, b.scale_y)
}
