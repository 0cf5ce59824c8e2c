//! Generation summary stored next to the region files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::CaveConfig;
use crate::error::RegionError;
use crate::pipeline::GenerationStats;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub world_size: i32,
    pub region_size: i32,
    pub seed: u64,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub stats: GenerationStats,
}

impl Manifest {
    pub fn new(config: &CaveConfig, seed: u64, stats: GenerationStats) -> Self {
        Self {
            world_size: config.world_size,
            region_size: config.region_size,
            seed,
            generated_at: Utc::now().to_rfc3339(),
            stats,
        }
    }

    /// Read `manifest.json` from an output directory.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, RegionError> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let file = File::open(&path)?;

        serde_json::from_reader(BufReader::new(file)).map_err(|e| RegionError::Corrupted {
            path,
            reason: e.to_string(),
        })
    }
}
