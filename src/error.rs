// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Errors produced by the SFC index engine and its collaborators.
#[derive(Debug)]
pub enum Error {
    /// Source point file is missing, unreadable, or malformed.
    BadInputFile(String),

    /// A world coordinate quantized outside the 31-bit per-axis domain.
    BadCoordinate {
        /// Which axis failed quantization.
        axis: &'static str,
        /// The offending quantized value.
        value: i64,
    },

    /// A query geometry quantized outside the 31-bit per-axis domain.
    BadQueryExtent(String),

    /// No valid `(H, T)` head/tail split could be derived for the dataset.
    BadSplit(String),

    /// A multi-file ingest saw inconsistent scale/offset across source files.
    HeterogeneousDataset {
        /// Dataset name being ingested.
        dataset: String,
    },

    /// The block store rejected an operation (connection, SQL, constraint).
    Store(String),

    /// A persisted dataset descriptor violates its load invariants.
    CorruptDescriptor(String),

    /// I/O error.
    Io(std::io::Error),

    /// JSON job description could not be parsed.
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SfcIndexError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<postgres::Error> for Error {
    fn from(value: postgres::Error) -> Self {
        Self::Store(value.to_string())
    }
}

impl From<las::Error> for Error {
    fn from(value: las::Error) -> Self {
        Self::BadInputFile(value.to_string())
    }
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
