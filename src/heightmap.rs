//! Read-only terrain heights consulted while placing and carving caves.

use std::fs;
use std::path::Path;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::error::{CaveError, CaveResult};

// =============================================================================
// TERRAIN PARAMETERS
// =============================================================================

/// Parameters for the synthetic terrain used when no heightmap is supplied
pub struct TerrainParams {
    /// Base frequency for noise (lower = larger features)
    pub base_frequency: f64,
    /// Number of noise octaves
    pub octaves: usize,
    /// Height of the flattest terrain
    pub base_height: f32,
    /// Height added by the noise at its peak
    pub relief: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            base_frequency: 0.004,
            octaves: 5,
            base_height: 90.0,
            relief: 80.0,
        }
    }
}

// =============================================================================
// HEIGHTMAP
// =============================================================================

/// Square grid of terrain heights indexed by `x + z * size`.
#[derive(Clone)]
pub struct HeightMap {
    size: i32,
    heights: Vec<f32>,
}

impl HeightMap {
    /// Flat terrain at a constant height.
    pub fn flat(size: i32, height: f32) -> Self {
        let size = size.max(0);
        Self {
            size,
            heights: vec![height; (size as usize) * (size as usize)],
        }
    }

    pub fn from_heights(size: i32, heights: Vec<f32>) -> CaveResult<Self> {
        if size < 0 || heights.len() != (size as usize) * (size as usize) {
            return Err(CaveError::Config(format!(
                "heightmap of size {} needs {} values, got {}",
                size,
                (size.max(0) as usize).pow(2),
                heights.len()
            )));
        }
        Ok(Self { size, heights })
    }

    /// Generate rolling terrain from layered Perlin noise.
    pub fn synthetic(size: i32, seed: u32) -> Self {
        Self::synthetic_with(size, seed, &TerrainParams::default())
    }

    pub fn synthetic_with(size: i32, seed: u32, params: &TerrainParams) -> Self {
        let fbm = Fbm::<Perlin>::new(seed)
            .set_octaves(params.octaves)
            .set_frequency(params.base_frequency);

        let mut map = Self::flat(size, 0.0);
        for z in 0..map.size {
            for x in 0..map.size {
                let n = fbm.get([x as f64, z as f64]) as f32;
                let h = params.base_height + (n * 0.5 + 0.5) * params.relief;
                map.set_height(x, z, h.clamp(0.0, 255.0));
            }
        }
        map
    }

    /// Load a grayscale PNG; 16-bit images keep their full precision.
    ///
    /// Pixel values are mapped linearly onto `[0, max_height]`.
    pub fn from_png<P: AsRef<Path>>(path: P, max_height: f32) -> CaveResult<Self> {
        let img = image::open(path.as_ref())
            .map_err(|e| CaveError::Config(format!("failed to load heightmap {}: {}", path.as_ref().display(), e)))?
            .to_luma16();

        let (width, height) = img.dimensions();
        if width != height {
            return Err(CaveError::Config(format!(
                "heightmap must be square, got {}x{}",
                width, height
            )));
        }

        let heights = img
            .pixels()
            .map(|p| p.0[0] as f32 / u16::MAX as f32 * max_height)
            .collect();

        Self::from_heights(width as i32, heights)
    }

    /// Load raw little-endian `u16` samples, row by row.
    pub fn from_raw<P: AsRef<Path>>(path: P, size: i32, vertical_scale: f32) -> CaveResult<Self> {
        let bytes = fs::read(path)?;
        let heights = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as f32 * vertical_scale)
            .collect();

        Self::from_heights(size, heights)
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// Terrain height at a column; zero outside the map.
    pub fn get_height(&self, x: i32, z: i32) -> f32 {
        if x < 0 || z < 0 || x >= self.size || z >= self.size {
            return 0.0;
        }
        self.heights[(x + z * self.size) as usize]
    }

    /// Terrain height rounded down to a block index.
    pub fn get_height_i(&self, x: i32, z: i32) -> i32 {
        self.get_height(x, z) as i32
    }

    pub fn set_height(&mut self, x: i32, z: i32, height: f32) {
        if x < 0 || z < 0 || x >= self.size || z >= self.size {
            return;
        }
        self.heights[(x + z * self.size) as usize] = height;
    }

    /// Lowest terrain over the footprint `[x0, x0 + sx) × [z0, z0 + sz)`.
    pub fn min_height_in(&self, x0: i32, z0: i32, sx: i32, sz: i32) -> f32 {
        let mut min = f32::MAX;
        for z in z0..z0 + sz {
            for x in x0..x0 + sx {
                min = min.min(self.get_height(x, z));
            }
        }
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_is_zero() {
        let map = HeightMap::flat(16, 64.0);
        assert_eq!(map.get_height(3, 3), 64.0);
        assert_eq!(map.get_height(-1, 3), 0.0);
        assert_eq!(map.get_height(3, 16), 0.0);
    }

    #[test]
    fn test_min_height_in_footprint() {
        let mut map = HeightMap::flat(32, 100.0);
        map.set_height(10, 12, 40.0);

        assert_eq!(map.min_height_in(8, 8, 5, 5), 40.0);
        assert_eq!(map.min_height_in(0, 0, 5, 5), 100.0);
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let a = HeightMap::synthetic(64, 7);
        let b = HeightMap::synthetic(64, 7);
        for i in 0..64 {
            assert_eq!(a.get_height(i, 63 - i), b.get_height(i, 63 - i));
            assert!(a.get_height(i, i) <= 255.0);
        }
    }

    #[test]
    fn test_from_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dtm.raw");
        let samples: Vec<u8> = (0..16u16).flat_map(|v| (v * 10).to_le_bytes()).collect();
        fs::write(&path, samples).unwrap();

        let map = HeightMap::from_raw(&path, 4, 1.0).unwrap();
        assert_eq!(map.get_height(1, 2), 90.0);
        assert!(HeightMap::from_raw(&path, 5, 1.0).is_err());
    }
}
