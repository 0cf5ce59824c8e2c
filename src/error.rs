//! Error types for cave generation and region storage.

use std::path::PathBuf;

/// Errors that abort a generation run.
#[derive(Debug, thiserror::Error)]
pub enum CaveError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no {pool} prefab available in the catalog")]
    EmptyPool { pool: &'static str },

    #[error("degenerate triangulation input near ({x:.1}, {z:.1})")]
    DegenerateTriangulation { x: f64, z: f64 },

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or writing region files.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("corrupted region file {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("block at y={y} cannot be stored in a region file")]
    OutOfRange { y: i32 },
}

/// Errors produced by the strict prefab catalog loader.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid prefab '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

pub type CaveResult<T> = Result<T, CaveError>;
