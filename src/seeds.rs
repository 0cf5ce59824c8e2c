//! Per-stage seeds for cave generation
//!
//! Every stage draws from its own seed so one of them can be varied while the
//! rest of the cave network stays put.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seeds for all cave generation stages, derived from a master seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaveSeeds {
    /// Master seed (recorded in the manifest)
    pub master: u64,
    /// Synthetic terrain when no heightmap is given
    pub terrain: u64,
    /// Underground prefab and room placement
    pub placement: u64,
    /// Room interiors
    pub rooms: u64,
    /// Natural entrance planning
    pub entrances: u64,
    /// Tunnel routing and radius profiles
    pub tunnels: u64,
    /// Water noise
    pub water: u64,
}

impl CaveSeeds {
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            terrain: derive_seed(master, "terrain"),
            placement: derive_seed(master, "placement"),
            rooms: derive_seed(master, "rooms"),
            entrances: derive_seed(master, "entrances"),
            tunnels: derive_seed(master, "tunnels"),
            water: derive_seed(master, "water"),
        }
    }

    pub fn builder(master: u64) -> CaveSeedsBuilder {
        CaveSeedsBuilder::new(master)
    }

    /// Deterministic RNG for one stage seed.
    pub fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    /// 32-bit seed for noise generators.
    pub fn noise_seed(seed: u64) -> u32 {
        (seed ^ (seed >> 32)) as u32
    }
}

impl Default for CaveSeeds {
    fn default() -> Self {
        Self::from_master(rand::random())
    }
}

/// Override individual stage seeds while deriving the others.
pub struct CaveSeedsBuilder {
    seeds: CaveSeeds,
}

impl CaveSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self { seeds: CaveSeeds::from_master(master) }
    }

    pub fn placement(mut self, seed: u64) -> Self {
        self.seeds.placement = seed;
        self
    }

    pub fn tunnels(mut self, seed: u64) -> Self {
        self.seeds.tunnels = seed;
        self
    }

    pub fn water(mut self, seed: u64) -> Self {
        self.seeds.water = seed;
        self
    }

    pub fn build(self) -> CaveSeeds {
        self.seeds
    }
}

fn derive_seed(master: u64, stage: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    stage.hash(&mut hasher);
    hasher.finish()
}

impl std::fmt::Display for CaveSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CaveSeeds {{ master: {}, placement: {}, rooms: {}, entrances: {}, tunnels: {}, water: {} }}",
            self.master, self.placement, self.rooms, self.entrances, self.tunnels, self.water,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_deterministic_derivation() {
        let a = CaveSeeds::from_master(777);
        let b = CaveSeeds::from_master(777);
        assert_eq!(a, b);
    }

    #[test]
    fn test_stages_get_different_seeds() {
        let seeds = CaveSeeds::from_master(777);
        assert_ne!(seeds.placement, seeds.tunnels);
        assert_ne!(seeds.rooms, seeds.water);
        assert_ne!(seeds.entrances, seeds.terrain);
    }

    #[test]
    fn test_builder_override() {
        let seeds = CaveSeeds::builder(777).tunnels(5).build();
        let derived = CaveSeeds::from_master(777);

        assert_eq!(seeds.tunnels, 5);
        assert_eq!(seeds.placement, derived.placement);
    }

    #[test]
    fn test_stage_rng_is_reproducible() {
        let x: u32 = CaveSeeds::rng(9).gen();
        let y: u32 = CaveSeeds::rng(9).gen();
        assert_eq!(x, y);
    }
}
