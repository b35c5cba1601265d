// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Point file readers (§6): streams `(x, y, z)` triples out of a source
//! file without holding the whole file in memory, so ingest scales to
//! files larger than RAM.

use std::path::Path;

use crate::error::{Error, Result};

/// One point read straight out of a source file, before quantization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawPoint {
    /// World-space X.
    pub x: f64,
    /// World-space Y.
    pub y: f64,
    /// World-space Z.
    pub z: f64,
}

/// A source file's header facts, read once before streaming points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FileHeader {
    /// Total number of points the file claims to hold.
    pub point_count: u64,
    /// World-space bounds, `(min_x, min_y, min_z, max_x, max_y, max_z)`.
    pub bounds: (f64, f64, f64, f64, f64, f64),
}

/// Source of point data for ingest. One implementation per supported file
/// format; `LasPointReader` is the only one the engine ships today (spec
/// §6 names LAS/LAZ as the input format).
pub trait PointFileReader {
    /// Reads the file's header without touching point data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadInputFile`] if the file cannot be opened or its
    /// header is malformed.
    fn header(&mut self) -> Result<FileHeader>;

    /// Calls `visit` once per point in the file, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadInputFile`] if the file is truncated or
    /// corrupt partway through.
    fn for_each_point(&mut self, visit: &mut dyn FnMut(RawPoint)) -> Result<()>;
}

/// Reads points from a LAS/LAZ file via the `las` crate, applying the
/// file's own scale/offset so points always arrive in world coordinates.
pub struct LasPointReader {
    reader: las::Reader,
}

impl LasPointReader {
    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadInputFile`] if the file cannot be opened or its
    /// header is malformed.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = las::Reader::from_path(path)
            .map_err(|e| Error::BadInputFile(format!("{}: {e}", path.display())))?;
        Ok(Self { reader })
    }
}

impl PointFileReader for LasPointReader {
    fn header(&mut self) -> Result<FileHeader> {
        let header = self.reader.header();
        let bounds = header.bounds();
        Ok(FileHeader {
            point_count: header.number_of_points(),
            bounds: (
                bounds.min.x,
                bounds.min.y,
                bounds.min.z,
                bounds.max.x,
                bounds.max.y,
                bounds.max.z,
            ),
        })
    }

    fn for_each_point(&mut self, visit: &mut dyn FnMut(RawPoint)) -> Result<()> {
        for point in self.reader.points() {
            let point = point?;
            visit(RawPoint {
                x: point.x,
                y: point.y,
                z: point.z,
            });
        }
        Ok(())
    }
}
