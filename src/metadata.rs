// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Dataset descriptor (C6): the quantization and split parameters a dataset
//! was built with, persisted alongside its blocks so later queries
//! reconstruct the same coordinate system.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::split::Split;

/// Everything a query needs to reinterpret a dataset's stored heads/tails
/// as world coordinates, persisted once at ingest time and loaded by every
/// later query or export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Dataset name; also the suffix of its `metadata_<name>`/`point_<name>`
    /// tables.
    pub name: String,
    /// Spatial reference identifier carried through from the ingest job;
    /// opaque to the engine, passed back unchanged on export.
    pub srid: i32,
    /// World-space offset subtracted before scaling, X.
    pub offset_x: f64,
    /// World-space offset subtracted before scaling, Y.
    pub offset_y: f64,
    /// World-space offset subtracted before scaling, Z (kept for export
    /// fidelity; Z is never quantized).
    pub offset_z: f64,
    /// Grid cell size along X.
    pub scale_x: f64,
    /// Grid cell size along Y.
    pub scale_y: f64,
    /// Quantized extent used to derive `split`, X.
    pub x_max: i64,
    /// Quantized extent used to derive `split`, Y.
    pub y_max: i64,
    /// Head/tail bit split this dataset's keys use.
    pub split: Split,
    /// Total number of points ingested.
    pub point_count: u64,
    /// World-space bounding box over every ingested file, `(min_x, min_y,
    /// min_z, max_x, max_y, max_z)`.
    pub bounds: (f64, f64, f64, f64, f64, f64),
}

impl DatasetDescriptor {
    /// Checks the invariants a descriptor must hold to be trusted: a
    /// non-empty name, a split whose bit lengths actually fit `x_max`/
    /// `y_max`, and a non-negative point count consistent with `bounds`
    /// being a real box.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptDescriptor`] on the first invariant that
    /// fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::CorruptDescriptor("empty dataset name".to_string()));
        }
        if self.scale_x <= 0.0 || self.scale_y <= 0.0 {
            return Err(Error::CorruptDescriptor(format!(
                "non-positive scale in descriptor for {}",
                self.name
            )));
        }
        if self.split.total_bits() == 0 || self.split.total_bits() > 62 {
            return Err(Error::CorruptDescriptor(format!(
                "split bit length out of range for {}",
                self.name
            )));
        }
        let (min_x, min_y, min_z, max_x, max_y, max_z) = self.bounds;
        if min_x > max_x || min_y > max_y || min_z > max_z {
            return Err(Error::CorruptDescriptor(format!(
                "inverted bounds in descriptor for {}",
                self.name
            )));
        }
        Ok(())
    }

    /// Serializes this descriptor to the JSON form stored in
    /// `metadata_<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails (practically never,
    /// since every field is a plain numeric or string).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and validates a descriptor previously produced by
    /// [`DatasetDescriptor::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed JSON, or
    /// [`Error::CorruptDescriptor`] if the parsed descriptor fails
    /// [`DatasetDescriptor::validate`].
    pub fn from_json(text: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sample() -> DatasetDescriptor {
        DatasetDescriptor {
            name: "plot_12".to_string(),
            srid: 4326,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_z: 0.0,
            scale_x: 0.1,
            scale_y: 0.1,
            x_max: 100,
            y_max: 100,
            split: Split {
                head_bits: 6,
                tail_bits: 8,
            },
            point_count: 9,
            bounds: (0.0, 0.0, 0.0, 10.0, 10.0, 5.0),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let descriptor = sample();
        let text = descriptor.to_json().unwrap();
        let back = DatasetDescriptor::from_json(&text).unwrap();
        assert_eq!(descriptor, back);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let mut descriptor = sample();
        descriptor.bounds.0 = 100.0;
        let text = serde_json::to_string(&descriptor).unwrap();
        assert!(matches!(
            DatasetDescriptor::from_json(&text),
            Err(Error::CorruptDescriptor(_))
        ));
    }

    #[test]
    fn rejects_non_positive_scale() {
        let mut descriptor = sample();
        descriptor.scale_x = 0.0;
        assert!(matches!(descriptor.validate(), Err(Error::CorruptDescriptor(_))));
    }
}
