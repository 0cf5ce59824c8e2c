//! Seeded coherent noise used for room carving and water placement.

use noise::{Billow, Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, RidgedMulti, Seedable, Value, Worley};
use serde::{Deserialize, Serialize};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Base noise function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseKind {
    Perlin,
    Value,
    OpenSimplex,
    /// Worley / cellular noise
    Cellular,
}

/// How octaves of the base noise are layered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalKind {
    /// Single octave
    None,
    /// Fractal Brownian motion
    Fbm,
    /// Ridged multifractal (sharp creases where the base crosses zero)
    Ridged,
    /// Absolute-value octaves, puffy blobs
    Billow,
    /// fBm folded back and forth between -1 and 1
    PingPong,
}

/// Flat noise parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub noise: NoiseKind,
    pub fractal: FractalKind,
    /// Number of octaves for fractal kinds
    pub octaves: u32,
    /// Base frequency (lower = larger features)
    pub frequency: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
    /// Amplitude multiplier per octave
    pub gain: f64,
    /// Values strictly above this threshold are cave
    pub threshold: f64,
    /// Negate the threshold
    pub invert: bool,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            noise: NoiseKind::Perlin,
            fractal: FractalKind::None,
            octaves: 1,
            frequency: 0.05,
            lacunarity: 2.0,
            gain: 0.5,
            threshold: 0.0,
            invert: false,
        }
    }
}

// =============================================================================
// NOISE FIELD
// =============================================================================

/// Octave cap of the fractal sources.
const MAX_OCTAVES: u32 = 32;

/// Any noise source usable in 2D and 3D.
trait Sampler: NoiseFn<f64, 2> + NoiseFn<f64, 3> {}

impl<T: NoiseFn<f64, 2> + NoiseFn<f64, 3>> Sampler for T {}

fn build_source(config: &NoiseConfig, seed: u32) -> Box<dyn Sampler> {
    match config.noise {
        NoiseKind::Perlin => fractal::<Perlin>(config, seed),
        NoiseKind::Value => fractal::<Value>(config, seed),
        NoiseKind::OpenSimplex => fractal::<OpenSimplex>(config, seed),
        NoiseKind::Cellular => fractal::<Worley>(config, seed),
    }
}

fn fractal<T>(config: &NoiseConfig, seed: u32) -> Box<dyn Sampler>
where
    T: Default + Seedable + NoiseFn<f64, 2> + NoiseFn<f64, 3> + 'static,
{
    let octaves = config.octaves.clamp(1, MAX_OCTAVES) as usize;
    let fbm = |octaves: usize| {
        Fbm::<T>::new(seed)
            .set_octaves(octaves)
            .set_frequency(config.frequency)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.gain)
    };

    match config.fractal {
        FractalKind::None => Box::new(fbm(1)),
        FractalKind::Fbm => Box::new(fbm(octaves)),
        FractalKind::PingPong => Box::new(PingPong(fbm(octaves))),
        FractalKind::Ridged => Box::new(
            RidgedMulti::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(config.frequency)
                .set_lacunarity(config.lacunarity)
                .set_persistence(config.gain),
        ),
        FractalKind::Billow => Box::new(
            Billow::<T>::new(seed)
                .set_octaves(octaves)
                .set_frequency(config.frequency)
                .set_lacunarity(config.lacunarity)
                .set_persistence(config.gain),
        ),
    }
}

/// Source whose output is folded into a triangle wave over [-1, 1].
struct PingPong<S>(S);

impl<S: NoiseFn<f64, D>, const D: usize> NoiseFn<f64, D> for PingPong<S> {
    fn get(&self, point: [f64; D]) -> f64 {
        ping_pong(self.0.get(point))
    }
}

fn ping_pong(v: f64) -> f64 {
    let t = (v + 1.0).rem_euclid(4.0);
    if t < 2.0 {
        t - 1.0
    } else {
        3.0 - t
    }
}

/// Thresholded coherent noise.
///
/// A field is cheap to rebuild, so callers needing independent streams for
/// unrelated queries derive a new one with [`NoiseField::reseeded`].
///
/// Cellular sources are not thread safe, so a field is never shared between
/// threads; parallel callers build one per worker from the same config.
pub struct NoiseField {
    config: NoiseConfig,
    seed: u32,
    source: Box<dyn Sampler>,
    threshold: f64,
}

impl NoiseField {
    pub fn new(config: &NoiseConfig, seed: u32) -> Self {
        let threshold = if config.invert { -config.threshold } else { config.threshold };

        Self { config: config.clone(), seed, source: build_source(config, seed), threshold }
    }

    /// Same parameters, different seed.
    pub fn reseeded(&self, seed: u32) -> Self {
        Self::new(&self.config, seed)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Raw noise value, roughly in [-1, 1].
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        NoiseFn::<f64, 3>::get(self.source.as_ref(), [x, y, z])
    }

    pub fn sample_2d(&self, x: f64, z: f64) -> f64 {
        NoiseFn::<f64, 2>::get(self.source.as_ref(), [x, z])
    }

    pub fn is_cave(&self, x: i32, y: i32, z: i32) -> bool {
        self.sample(x as f64, y as f64, z as f64) > self.threshold
    }

    pub fn is_cave_2d(&self, x: i32, z: i32) -> bool {
        self.sample_2d(x as f64, z as f64) > self.threshold
    }
}

// =============================================================================
// WATER NOISE
// =============================================================================

/// How much of the cave network gets flooded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum WaterLevel {
    None,
    Low,
    Medium,
    High,
    Full,
}

impl WaterLevel {
    fn threshold(&self) -> f64 {
        match self {
            WaterLevel::None => f64::INFINITY,
            WaterLevel::Low => -0.5,
            WaterLevel::Medium => -0.3,
            WaterLevel::High => -0.2,
            WaterLevel::Full => f64::NEG_INFINITY,
        }
    }
}

/// 2D mask deciding which water candidates actually get flooded.
pub struct WaterNoise {
    field: NoiseField,
    level: WaterLevel,
}

impl WaterNoise {
    pub fn new(seed: u32, level: WaterLevel) -> Self {
        let config = NoiseConfig {
            noise: NoiseKind::Perlin,
            fractal: FractalKind::None,
            frequency: 0.01,
            threshold: level.threshold(),
            ..NoiseConfig::default()
        };

        Self { field: NoiseField::new(&config, seed), level }
    }

    pub fn is_water(&self, x: i32, z: i32) -> bool {
        match self.level {
            WaterLevel::None => false,
            WaterLevel::Full => true,
            _ => self.field.is_cave_2d(x, z),
        }
    }
}
