//! Reading and writing region files.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::format::{ChunkRecord, RegionFile};
use super::manifest::{Manifest, MANIFEST_FILE};
use super::{region_path, RegionGrid};
use crate::block::{CaveBlock, MAX_Y};
use crate::error::RegionError;

/// Writes a cave map as a directory of region files.
///
/// Layout: `{dir}/region_{id}.bin` plus `{dir}/manifest.json`.
pub struct RegionWriter {
    dir: PathBuf,
    grid: RegionGrid,
}

impl RegionWriter {
    pub fn new<P: AsRef<Path>>(dir: P, grid: RegionGrid) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), grid }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Write every chunk into its region file, returning the number of
    /// files written.
    ///
    /// Chunks are written in coordinate order so identical maps produce
    /// identical files.
    pub fn write_chunks(&self, chunks: &BTreeMap<(i32, i32), Vec<CaveBlock>>) -> Result<usize, RegionError> {
        self.ensure_dir()?;

        let mut regions: BTreeMap<u32, Vec<ChunkRecord>> = BTreeMap::new();
        for (&(cx, cz), blocks) in chunks {
            let record = ChunkRecord::new(cx, cz, blocks)?;
            regions.entry(self.grid.region_id(cx, cz)).or_default().push(record);
        }

        for (&id, records) in &mut regions {
            let file = RegionFile::new(id, std::mem::take(records));
            self.write_region(&file)?;
        }

        log::debug!("wrote {} region files to {}", regions.len(), self.dir.display());
        Ok(regions.len())
    }

    pub fn write_region(&self, region: &RegionFile) -> Result<(), RegionError> {
        self.ensure_dir()?;

        let file = File::create(region_path(&self.dir, region.region_id))?;
        let mut writer = BufWriter::new(file);

        bincode::serialize_into(&mut writer, region).map_err(|e| RegionError::Serialization(e.to_string()))?;
        writer.flush()?;

        Ok(())
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<(), RegionError> {
        self.ensure_dir()?;

        let file = File::create(self.dir.join(MANIFEST_FILE))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, manifest).map_err(|e| RegionError::Serialization(e.to_string()))?;
        writer.flush()?;

        Ok(())
    }
}

/// Loads single region files.
pub struct RegionReader;

impl RegionReader {
    /// Decode and validate a region file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<RegionFile, RegionError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let region: RegionFile = bincode::deserialize_from(reader).map_err(|e| RegionError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        region.validate(path)?;

        Ok(region)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<CaveRegion, RegionError> {
        Self::read(path).map(CaveRegion::from_file)
    }
}

/// A decoded region indexed for point lookups.
#[derive(Debug, Default)]
pub struct CaveRegion {
    id: u32,
    chunks: HashMap<(i32, i32), HashMap<u16, CaveBlock>>,
}

impl CaveRegion {
    pub fn from_file(file: RegionFile) -> Self {
        let chunks = file
            .chunks
            .iter()
            .map(|chunk| {
                let blocks = chunk.blocks().map(|b| (b.packed_local(), b)).collect();
                ((chunk.x as i32, chunk.z as i32), blocks)
            })
            .collect();

        Self { id: file.region_id, chunks }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn block_count(&self) -> usize {
        self.chunks.values().map(HashMap::len).sum()
    }

    /// Block at a generation position.
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<&CaveBlock> {
        if !(0..=MAX_Y).contains(&y) {
            return None;
        }
        let block = CaveBlock::new(x, y, z);
        self.chunks.get(&block.chunk())?.get(&block.packed_local())
    }

    /// Blocks of one chunk, in no particular order.
    pub fn chunk_blocks(&self, chunk_x: i32, chunk_z: i32) -> impl Iterator<Item = &CaveBlock> + '_ {
        self.chunks.get(&(chunk_x, chunk_z)).into_iter().flat_map(|c| c.values())
    }
}
