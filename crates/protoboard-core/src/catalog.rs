//! Element type catalog: the palette of draggable primitives.
//!
//! The catalog is loaded once (from JSON or the built-in defaults) and is
//! immutable at runtime apart from registering new custom component types.
//! Icons are a closed enumeration checked at load time, so a catalog with an
//! unknown icon name fails to load instead of failing at render time.

use crate::tree::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Icon identifiers understood by the front-end renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Header,
    Paragraph,
    Button,
    Link,
    Image,
    List,
    Form,
    Input,
    Container,
    Navbar,
    Component,
}

/// A catalog entry describing one draggable primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementType {
    pub id: u32,
    pub name: String,
    pub icon: Icon,
}

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate element type id {0}")]
    DuplicateId(u32),
    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The set of element types available on the palette.
#[derive(Debug, Clone)]
pub struct ElementCatalog {
    entries: Vec<ElementType>,
    by_id: HashMap<u32, usize>,
    next_custom_id: u32,
}

impl ElementCatalog {
    /// Ids above this value denote custom, user-defined component types;
    /// ids at or below it are built-ins and cannot be deleted.
    pub const CUSTOM_ID_BASE: u32 = 100;

    /// The built-in HTML element palette.
    pub fn builtin() -> Self {
        let entries = vec![
            ElementType { id: 1, name: "Header".into(), icon: Icon::Header },
            ElementType { id: 2, name: "Paragraph".into(), icon: Icon::Paragraph },
            ElementType { id: 3, name: "Container".into(), icon: Icon::Container },
            ElementType { id: 4, name: "Button".into(), icon: Icon::Button },
            ElementType { id: 5, name: "Link".into(), icon: Icon::Link },
            ElementType { id: 6, name: "Image".into(), icon: Icon::Image },
            ElementType { id: 7, name: "List".into(), icon: Icon::List },
            ElementType { id: 8, name: "Form".into(), icon: Icon::Form },
            ElementType { id: 9, name: "Input".into(), icon: Icon::Input },
            ElementType { id: 10, name: "Navbar".into(), icon: Icon::Navbar },
        ];
        // Built-ins are hand-maintained; ids are unique by construction.
        Self::from_entries(entries).expect("built-in catalog is valid")
    }

    /// Load a catalog from a JSON array of `{ id, name, icon }` entries.
    ///
    /// Unknown icon names and duplicate ids are load errors.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<ElementType> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<ElementType>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut next_custom_id = Self::CUSTOM_ID_BASE + 1;
        for (index, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.id, index).is_some() {
                return Err(CatalogError::DuplicateId(entry.id));
            }
            if entry.id >= next_custom_id {
                next_custom_id = entry.id + 1;
            }
        }
        Ok(Self {
            entries,
            by_id,
            next_custom_id,
        })
    }

    /// Look up an element type by id.
    pub fn get(&self, id: u32) -> Option<&ElementType> {
        self.by_id.get(&id).map(|&index| &self.entries[index])
    }

    /// All entries, in palette order.
    pub fn entries(&self) -> &[ElementType] {
        &self.entries
    }

    /// Whether an id denotes a custom, user-defined component type.
    pub fn is_custom(id: u32) -> bool {
        id > Self::CUSTOM_ID_BASE
    }

    /// The node kind instances of this type carry.
    pub fn kind_of(id: u32) -> NodeKind {
        if Self::is_custom(id) {
            NodeKind::Custom
        } else {
            NodeKind::HtmlElement
        }
    }

    /// Register a new custom component type and return its id.
    pub fn register_custom(&mut self, name: impl Into<String>) -> u32 {
        let id = self.next_custom_id;
        self.next_custom_id += 1;
        self.by_id.insert(id, self.entries.len());
        self.entries.push(ElementType {
            id,
            name: name.into(),
            icon: Icon::Component,
        });
        id
    }
}

impl Default for ElementCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
