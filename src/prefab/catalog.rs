//! Prefab definitions supplied by the host.
//!
//! The loader is strict: unknown fields, non-positive sizes and cave markers
//! that do not sit on a face of their prefab are all rejected.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{TAG_CAVE, TAG_CAVE_MARKER, TAG_ENTRANCE, TAG_UNDERGROUND, TAG_WILDERNESS};
use crate::error::CatalogError;
use crate::geometry::Vector3i;

/// Connection marker in prefab-local space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerData {
    pub start: Vector3i,
    pub size: Vector3i,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MarkerData {
    pub fn is_cave_marker(&self) -> bool {
        self.tags.iter().any(|t| t == TAG_CAVE_MARKER)
    }
}

/// One catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefabData {
    pub name: String,
    pub size: Vector3i,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub markers: Vec<MarkerData>,
    /// Minimum distance between two placed instances of this prefab
    #[serde(default)]
    pub duplicate_repeat_distance: Option<i32>,
    /// Solid blocks below the surface, used to keep tunnels out of
    /// foundations of surface prefabs
    #[serde(default)]
    pub obstacles: Vec<Vector3i>,
}

impl PrefabData {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_cave(&self) -> bool {
        self.has_tag(TAG_CAVE)
    }

    pub fn cave_markers(&self) -> impl Iterator<Item = &MarkerData> {
        self.markers.iter().filter(|m| m.is_cave_marker())
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::Invalid { name: self.name.clone(), reason };

        if self.name.trim().is_empty() {
            return Err(invalid("empty name".to_string()));
        }
        if self.size.min_component() <= 0 {
            return Err(invalid(format!("size must be positive, got [{}]", self.size)));
        }

        for marker in self.cave_markers() {
            if marker.size.min_component() <= 0 {
                return Err(invalid(format!("marker at [{}] has empty size", marker.start)));
            }
            let on_face = marker.start.x == -1
                || marker.start.x == self.size.x
                || marker.start.z == -1
                || marker.start.z == self.size.z;
            if !on_face {
                return Err(invalid(format!(
                    "marker at [{}] does not sit on a face of [{}]",
                    marker.start, self.size
                )));
            }
        }

        if self.is_cave() && self.cave_markers().next().is_none() && self.has_tag(TAG_UNDERGROUND) {
            return Err(invalid("underground prefab without cave markers".to_string()));
        }

        Ok(())
    }
}

/// Validated set of prefab definitions.
#[derive(Clone, Debug, Default)]
pub struct PrefabCatalog {
    prefabs: Vec<PrefabData>,
    by_name: HashMap<String, usize>,
}

impl PrefabCatalog {
    pub fn new(prefabs: Vec<PrefabData>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::new();
        for (i, prefab) in prefabs.iter().enumerate() {
            prefab.validate()?;
            if by_name.insert(prefab.name.clone(), i).is_some() {
                return Err(CatalogError::Invalid {
                    name: prefab.name.clone(),
                    reason: "duplicate prefab name".to_string(),
                });
            }
        }
        Ok(Self { prefabs, by_name })
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let prefabs: Vec<PrefabData> = serde_json::from_str(text)?;
        Self::new(prefabs)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|source| CatalogError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PrefabData> {
        self.by_name.get(name).map(|&i| &self.prefabs[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrefabData> {
        self.prefabs.iter()
    }

    /// Cave prefabs fully buried underground.
    pub fn underground(&self) -> Vec<&PrefabData> {
        self.prefabs
            .iter()
            .filter(|p| p.is_cave() && p.has_tag(TAG_UNDERGROUND))
            .collect()
    }

    /// Cave entrances spawned on wilderness tiles.
    pub fn wilderness_entrances(&self) -> Vec<&PrefabData> {
        self.prefabs
            .iter()
            .filter(|p| p.is_cave() && p.has_tag(TAG_ENTRANCE) && p.has_tag(TAG_WILDERNESS))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "name": "cave_hall",
            "size": { "x": 20, "y": 12, "z": 16 },
            "tags": ["cave", "underground"],
            "markers": [
                { "start": { "x": -1, "y": 2, "z": 4 }, "size": { "x": 1, "y": 5, "z": 5 }, "tags": ["cavenode"] },
                { "start": { "x": 8, "y": 2, "z": 16 }, "size": { "x": 5, "y": 5, "z": 1 }, "tags": ["cavenode"] }
            ]
        },
        {
            "name": "shack",
            "size": { "x": 10, "y": 8, "z": 10 },
            "tags": ["cave", "entrance", "wilderness"]
        },
        {
            "name": "house",
            "size": { "x": 12, "y": 20, "z": 12 },
            "obstacles": [{ "x": 1, "y": 0, "z": 1 }]
        }
    ]"#;

    #[test]
    fn test_load_pools() {
        let catalog = PrefabCatalog::from_json(CATALOG).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.underground().len(), 1);
        assert_eq!(catalog.wilderness_entrances().len(), 1);
        assert_eq!(catalog.get("cave_hall").unwrap().cave_markers().count(), 2);
        assert_eq!(catalog.get("house").unwrap().obstacles.len(), 1);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(PrefabCatalog::from_json("[{"), Err(CatalogError::Parse(_))));
        assert!(matches!(
            PrefabCatalog::from_json(r#"[{ "name": "a", "size": { "x": 1, "y": 1, "z": 1 }, "colour": 3 }]"#),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_marker_off_face() {
        let json = r#"[{
            "name": "bad",
            "size": { "x": 10, "y": 10, "z": 10 },
            "tags": ["cave", "underground"],
            "markers": [{ "start": { "x": 3, "y": 2, "z": 3 }, "size": { "x": 2, "y": 2, "z": 2 }, "tags": ["cavenode"] }]
        }]"#;

        assert!(matches!(PrefabCatalog::from_json(json), Err(CatalogError::Invalid { .. })));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let json = r#"[
            { "name": "a", "size": { "x": 1, "y": 1, "z": 1 } },
            { "name": "a", "size": { "x": 2, "y": 2, "z": 2 } }
        ]"#;
        assert!(matches!(PrefabCatalog::from_json(json), Err(CatalogError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = PrefabCatalog::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
