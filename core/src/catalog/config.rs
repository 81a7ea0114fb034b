//! Catalog loading
//!
//! Catalogs are TOML files with `[[element]]` and `[[resource]]` tables:
//!
//! ```toml
//! [[element]]
//! id = "fire"
//! icon = "🔥"
//! color = "#ff5500"
//!
//! [[resource]]
//! id = "iron_ore"
//! name = "Iron Ore"
//! rarity = "common"
//! combination = ["fire", "earth"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use forage_types::{CharacterId, ElementId, Rarity, ResourceId};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::{Catalog, Element, Resource};

/// Raw element table as written in the catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementEntry {
    pub id: ElementId,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

/// Raw resource table as written in the catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub rarity: Rarity,
    pub combination: Vec<ElementId>,
    #[serde(default)]
    pub discovered: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default, rename = "element")]
    pub elements: Vec<ElementEntry>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
}

impl CatalogConfig {
    /// Validate ids and build the runtime catalog
    pub fn into_catalog(self) -> Result<Catalog, CatalogError> {
        let mut element_ids = HashSet::new();
        for element in &self.elements {
            if !element_ids.insert(element.id.clone()) {
                return Err(CatalogError::DuplicateElement(element.id.clone()));
            }
        }

        let mut resource_ids = HashSet::new();
        for resource in &self.resources {
            if !resource_ids.insert(resource.id.clone()) {
                return Err(CatalogError::DuplicateResource(resource.id.clone()));
            }
            if let Some(unknown) = resource
                .combination
                .iter()
                .find(|id| !element_ids.contains(*id))
            {
                return Err(CatalogError::UnknownElement {
                    resource: resource.id.clone(),
                    element: unknown.clone(),
                });
            }
            if resource.combination.is_empty() {
                tracing::warn!(resource = %resource.id, "Resource has an empty combination");
            }
        }

        let elements = self
            .elements
            .into_iter()
            .map(|e| Element {
                id: e.id,
                icon: e.icon,
                color: e.color,
            })
            .collect();
        let resources = self
            .resources
            .into_iter()
            .map(|r| Resource {
                id: r.id,
                name: r.name,
                rarity: r.rarity,
                required_combination: r.combination,
                discovered: r.discovered,
            })
            .collect();

        Ok(Catalog::new(elements, resources))
    }
}

/// Load and validate a single TOML catalog file
pub fn load_file(path: &Path) -> Result<Catalog, CatalogError> {
    let contents = fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: CatalogConfig = toml::from_str(&contents).map_err(|e| CatalogError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    config.into_catalog()
}

/// Source of the element/resource catalog for a character
pub trait CatalogProvider {
    fn load_catalog(&self, character: &CharacterId) -> Result<Catalog, CatalogError>;
}

/// Reads the catalog from a TOML file on disk
#[derive(Debug, Clone)]
pub struct FileCatalogProvider {
    path: PathBuf,
}

impl FileCatalogProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogProvider for FileCatalogProvider {
    fn load_catalog(&self, character: &CharacterId) -> Result<Catalog, CatalogError> {
        let catalog = load_file(&self.path)?;
        tracing::debug!(
            %character,
            path = %self.path.display(),
            resources = catalog.resources().len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }
}

/// Hands out clones of an in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogProvider(pub Catalog);

impl CatalogProvider for StaticCatalogProvider {
    fn load_catalog(&self, _character: &CharacterId) -> Result<Catalog, CatalogError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("duplicate element id '{0}'")]
    DuplicateElement(ElementId),
    #[error("duplicate resource id '{0}'")]
    DuplicateResource(ResourceId),
    #[error("resource '{resource}' requires unknown element '{element}'")]
    UnknownElement {
        resource: ResourceId,
        element: ElementId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
[[element]]
id = "fire"
icon = "F"
color = "#ff5500"

[[element]]
id = "earth"
icon = "E"
color = "#8b5a2b"

[[resource]]
id = "iron_ore"
name = "Iron Ore"
rarity = "common"
combination = ["fire", "earth"]

[[resource]]
id = "magma"
name = "Magma"
rarity = "epic"
combination = ["fire", "fire", "earth"]
discovered = true
"##;

    #[test]
    fn test_parse_catalog_toml() {
        let config: CatalogConfig = toml::from_str(SAMPLE).unwrap();
        let catalog = config.into_catalog().unwrap();

        assert_eq!(catalog.elements().len(), 2);
        assert_eq!(catalog.resources().len(), 2);

        let iron = catalog.resource(&ResourceId::from("iron_ore")).unwrap();
        assert_eq!(iron.name, "Iron Ore");
        assert_eq!(iron.rarity, Rarity::Common);
        assert!(!iron.discovered);

        let magma = catalog.resource(&ResourceId::from("magma")).unwrap();
        assert_eq!(magma.required_combination.len(), 3);
        assert!(magma.discovered);
    }

    #[test]
    fn test_unknown_element_rejected() {
        let toml = r#"
[[element]]
id = "fire"

[[resource]]
id = "steam"
name = "Steam"
combination = ["fire", "water"]
"#;
        let config: CatalogConfig = toml::from_str(toml).unwrap();
        let err = config.into_catalog().unwrap_err();
        assert!(matches!(err, CatalogError::UnknownElement { ref element, .. } if element.as_str() == "water"));
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let toml = r#"
[[element]]
id = "fire"

[[resource]]
id = "ember"
name = "Ember"
combination = ["fire"]

[[resource]]
id = "ember"
name = "Ember Again"
combination = ["fire"]
"#;
        let config: CatalogConfig = toml::from_str(toml).unwrap();
        assert!(matches!(
            config.into_catalog(),
            Err(CatalogError::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_file_provider_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("forage_catalog_{}.toml", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();

        let provider = FileCatalogProvider::new(&path);
        let catalog = provider.load_catalog(&CharacterId::from("tester")).unwrap();
        assert_eq!(catalog.resources().len(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let provider = FileCatalogProvider::new("/definitely/not/here.toml");
        assert!(matches!(
            provider.load_catalog(&CharacterId::from("tester")),
            Err(CatalogError::Io { .. })
        ));
    }
}
