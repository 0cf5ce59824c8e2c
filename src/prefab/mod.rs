//! Prefabs: catalog definitions, placed instances and their spatial index.

pub mod catalog;
pub mod cave_prefab;
pub mod cluster;
pub mod entrances;
pub mod index;
pub mod layout;
pub mod placer;

pub use catalog::{MarkerData, PrefabCatalog, PrefabData};
pub use cave_prefab::{CavePrefab, GraphNode, Marker, NodeRef};
pub use entrances::{natural_entrance, plan_natural_entrances, plan_wilderness_entrances, EntranceSelector};
pub use index::PrefabIndex;
pub use layout::{StreetTile, SurfacePrefab, WorldLayout};
pub use placer::PrefabPlacer;
