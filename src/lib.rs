//! Procedural cave network generation.
//!
//! Prefabs are scattered underground, linked by a pruned Delaunay graph and
//! connected with noisy tunnels. Rooms are carved with a cellular automaton,
//! low tunnel sections can be flooded, and the result is saved as region
//! files that [`region::CaveChunksProvider`] answers block queries from.

pub mod block;
pub mod cavemap;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod heightmap;
pub mod noise_field;
pub mod pipeline;
pub mod prefab;
pub mod region;
pub mod room;
pub mod seeds;
pub mod sphere;
pub mod tunnel;

pub use block::CaveBlock;
pub use cavemap::CaveMap;
pub use config::CaveConfig;
pub use error::{CaveError, CaveResult, CatalogError, RegionError};
pub use pipeline::{CaveGenerator, CaveWorld, GenerationStats, Stage};
pub use region::CaveChunksProvider;
pub use seeds::CaveSeeds;
