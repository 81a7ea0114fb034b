//! Resource and element catalog
//!
//! The catalog is read-only input from the outside world with a single
//! exception: a resource's `discovered` flag is flipped in place once the
//! discovery gateway confirms it. It never flips back.

mod config;

pub use config::{
    CatalogConfig, CatalogError, CatalogProvider, ElementEntry, FileCatalogProvider,
    ResourceEntry, StaticCatalogProvider, load_file,
};

use forage_types::{ElementId, Rarity, ResourceId};

/// An atomic token the player selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: ElementId,
    pub icon: String,
    pub color: String,
}

/// A gatherable resource and the combination that unlocks it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub rarity: Rarity,
    /// Ordered as listed by the provider, compared as a multiset
    pub required_combination: Vec<ElementId>,
    pub discovered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    elements: Vec<Element>,
    resources: Vec<Resource>,
}

impl Catalog {
    pub fn new(elements: Vec<Element>, resources: Vec<Resource>) -> Self {
        Self {
            elements,
            resources,
        }
    }

    /// Catalog with nothing in it, used when the provider is unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Resources in catalog order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub fn discovered(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.discovered)
    }

    /// Flip `discovered` to true. Returns whether the flag actually changed.
    pub fn mark_discovered(&mut self, id: &ResourceId) -> bool {
        match self.resources.iter_mut().find(|r| &r.id == id) {
            Some(resource) if !resource.discovered => {
                resource.discovered = true;
                true
            }
            _ => false,
        }
    }
}
