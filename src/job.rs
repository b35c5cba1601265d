// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! JSON job descriptions (spec §6): the on-disk shape each CLI binary
//! accepts via `--input <file>`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::geometry::{Bbox, Circle, Geometry, Polygon};
use crate::ingest::{IngestSpec, SourceMode};

fn default_ratio() -> f64 {
    0.5
}

/// One entry of an ingest job's `"imports"` map; the map key is the
/// dataset name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportEntry {
    /// `"file"` to ingest a single point file, `"dir"` to ingest every
    /// file in a directory.
    pub mode: String,
    /// File or directory path.
    pub path: PathBuf,
    /// Spatial reference identifier, passed through opaque to the engine.
    pub srid: i32,
    /// Head/tail ratio; defaults to `0.5` when omitted.
    #[serde(default = "default_ratio")]
    pub ratio: f64,
}

impl ImportEntry {
    /// Builds the [`IngestSpec`] this entry describes for dataset
    /// `dataset_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadInputFile`] if `mode` is neither `"file"` nor
    /// `"dir"`.
    pub fn to_ingest_spec(&self, dataset_name: &str) -> Result<IngestSpec> {
        let mode = match self.mode.as_str() {
            "file" => SourceMode::File,
            "dir" => SourceMode::Dir,
            other => {
                return Err(Error::BadInputFile(format!(
                    "unknown import mode {other:?}, expected \"file\" or \"dir\""
                )))
            }
        };
        Ok(IngestSpec {
            dataset_name: dataset_name.to_string(),
            mode,
            path: self.path.clone(),
            srid: self.srid,
            ratio: self.ratio,
        })
    }
}

/// `importer --input <path>` job description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestJob {
    /// Database connection.
    pub config: DbConfig,
    /// Named imports to ingest, keyed by dataset name.
    pub imports: BTreeMap<String, ImportEntry>,
}

/// One entry of a query job's `"queries"` map; the map key names the
/// query (and, for `querier`, the output relation/file).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryEntry {
    /// Dataset the query runs against.
    pub source_dataset: String,
    /// `"bbox"`, `"circle"`, `"polygon"`, or `"nn"` (rejected: out of
    /// scope, see spec Non-goals).
    pub mode: String,
    /// Geometry payload, shaped per `mode`: `[x0,x1,y0,y1]` for bbox,
    /// `[[cx,cy], r]` for circle, a WKT `POLYGON(...)` string for polygon.
    pub geometry: serde_json::Value,
    /// If set, drop every result point with `z` above this bound.
    pub maxz: Option<f64>,
    /// If set, drop every result point with `z` below this bound.
    pub minz: Option<f64>,
}

impl QueryEntry {
    /// Parses [`QueryEntry::geometry`] into a [`Geometry`] per
    /// [`QueryEntry::mode`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadQueryExtent`] if `mode` is `"nn"` (nearest-
    /// neighbor search is out of scope) or unrecognized, or if `geometry`
    /// does not match the shape `mode` expects.
    pub fn to_geometry(&self) -> Result<Geometry> {
        match self.mode.as_str() {
            "bbox" => {
                let v = self.geometry.as_array().ok_or_else(bad_geometry)?;
                let [x0, x1, y0, y1] = parse_f64_array::<4>(v)?;
                Ok(Bbox {
                    min_x: x0.min(x1),
                    min_y: y0.min(y1),
                    max_x: x0.max(x1),
                    max_y: y0.max(y1),
                }
                .into())
            }
            "circle" => {
                let v = self.geometry.as_array().ok_or_else(bad_geometry)?;
                if v.len() != 2 {
                    return Err(bad_geometry());
                }
                let center = v[0].as_array().ok_or_else(bad_geometry)?;
                let [cx, cy] = parse_f64_array::<2>(center)?;
                let radius = v[1].as_f64().ok_or_else(bad_geometry)?;
                Ok(Circle {
                    center_x: cx,
                    center_y: cy,
                    radius,
                }
                .into())
            }
            "polygon" => {
                let wkt = self.geometry.as_str().ok_or_else(bad_geometry)?;
                Ok(Polygon {
                    vertices: parse_wkt_polygon(wkt)?,
                }
                .into())
            }
            "nn" => Err(Error::BadQueryExtent(
                "nearest-neighbor queries are out of scope".to_string(),
            )),
            other => Err(Error::BadQueryExtent(format!("unknown query mode {other:?}"))),
        }
    }
}

fn bad_geometry() -> Error {
    Error::BadQueryExtent("malformed geometry payload".to_string())
}

fn parse_f64_array<const N: usize>(values: &[serde_json::Value]) -> Result<[f64; N]> {
    if values.len() != N {
        return Err(bad_geometry());
    }
    let mut out = [0.0; N];
    for (i, v) in values.iter().enumerate() {
        out[i] = v.as_f64().ok_or_else(bad_geometry)?;
    }
    Ok(out)
}

/// Parses a single-ring `POLYGON((x0 y0, x1 y1, ...))` WKT string. Holes
/// and multi-polygons are not supported (see spec Non-goals on complex
/// geometry).
fn parse_wkt_polygon(wkt: &str) -> Result<Vec<(f64, f64)>> {
    let inner = wkt
        .trim()
        .strip_prefix("POLYGON")
        .map(str::trim)
        .and_then(|s| s.strip_prefix("(("))
        .and_then(|s| s.strip_suffix("))"))
        .ok_or_else(bad_geometry)?;

    inner
        .split(',')
        .map(|pair| {
            let mut parts = pair.trim().split_whitespace();
            let x: f64 = parts.next().and_then(|v| v.parse().ok()).ok_or_else(bad_geometry)?;
            let y: f64 = parts.next().and_then(|v| v.parse().ok()).ok_or_else(bad_geometry)?;
            Ok((x, y))
        })
        .collect()
}

/// `querier --input <path>` job description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryJob {
    /// Database connection.
    pub config: DbConfig,
    /// Named queries to run, keyed by query name.
    pub queries: BTreeMap<String, QueryEntry>,
}

/// `exporter --input <path>` job description: each named query is
/// exported whole to `<name>.las` (an empty [`QueryEntry`]-less entry
/// means "the whole dataset").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Database connection.
    pub config: DbConfig,
    /// Dataset names to export, keyed by output name.
    pub queries: BTreeMap<String, ExportEntry>,
}

/// One entry of an export job's `"queries"` map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Dataset to export in full.
    pub source_dataset: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Refine;
    use test_log::test;

    fn db() -> DbConfig {
        DbConfig {
            host: "h".to_string(),
            port: 5432,
            dbname: "d".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        }
    }

    #[test]
    fn ingest_job_parses_nested_imports() {
        let text = r#"{
            "config": {"host": "h", "dbname": "d", "user": "u", "password": "p"},
            "imports": {
                "plot_12": {"mode": "file", "path": "plot_12.las", "srid": 4326}
            }
        }"#;
        let job: IngestJob = serde_json::from_str(text).unwrap();
        let entry = &job.imports["plot_12"];
        assert_eq!(entry.ratio, 0.5);
        let spec = entry.to_ingest_spec("plot_12").unwrap();
        assert_eq!(spec.mode, SourceMode::File);
    }

    #[test]
    fn query_entry_parses_bbox_geometry() {
        let entry = QueryEntry {
            source_dataset: "plot_12".to_string(),
            mode: "bbox".to_string(),
            geometry: serde_json::json!([0.5, 2.5, 0.5, 2.5]),
            maxz: None,
            minz: None,
        };
        let geometry = entry.to_geometry().unwrap();
        assert_eq!(geometry.world_envelope(), (0.5, 0.5, 2.5, 2.5));
    }

    #[test]
    fn query_entry_parses_circle_geometry() {
        let entry = QueryEntry {
            source_dataset: "plot_12".to_string(),
            mode: "circle".to_string(),
            geometry: serde_json::json!([[1.0, 1.0], 1.0]),
            maxz: None,
            minz: None,
        };
        let geometry = entry.to_geometry().unwrap();
        assert_eq!(geometry.world_envelope(), (0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn query_entry_parses_polygon_wkt() {
        let entry = QueryEntry {
            source_dataset: "plot_12".to_string(),
            mode: "polygon".to_string(),
            geometry: serde_json::json!("POLYGON((0 0, 4 0, 4 4, 0 4))"),
            maxz: None,
            minz: None,
        };
        let geometry = entry.to_geometry().unwrap();
        assert_eq!(geometry.world_envelope(), (0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn query_entry_rejects_nn_mode() {
        let entry = QueryEntry {
            source_dataset: "plot_12".to_string(),
            mode: "nn".to_string(),
            geometry: serde_json::Value::Null,
            maxz: None,
            minz: None,
        };
        assert!(entry.to_geometry().is_err());
    }

    #[test]
    fn export_job_round_trips() {
        let job = ExportJob {
            config: db(),
            queries: BTreeMap::from([(
                "plot_12".to_string(),
                ExportEntry {
                    source_dataset: "plot_12".to_string(),
                },
            )]),
        };
        let text = serde_json::to_string(&job).unwrap();
        let back: ExportJob = serde_json::from_str(&text).unwrap();
        assert_eq!(job, back);
    }
}
