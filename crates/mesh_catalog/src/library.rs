use crate::error::CatalogError;
use crate::taxonomy::{split_type, Taxonomy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One catalog entry.
///
/// Entries without `Name` or `Type` are loaded but never matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeshEntry {
    /// Category key the entry was listed under.
    #[serde(skip)]
    pub category: String,
    #[serde(default)]
    pub name: Option<Vec<String>>,
    #[serde(rename = "Type", default)]
    pub kind: Option<Vec<String>>,
    #[serde(default)]
    pub additional_type: Option<Vec<String>>,
    /// Model asset paths; the first one is used.
    #[serde(default)]
    pub shape: Option<Vec<String>>,
}

impl MeshEntry {
    pub fn is_matchable(&self) -> bool {
        self.name.is_some() && self.kind.is_some()
    }

    /// Classify `Type` and `AdditionalType` together.
    pub fn taxonomy(&self) -> Taxonomy {
        let tokens = self
            .kind
            .iter()
            .chain(self.additional_type.iter())
            .flatten()
            .flat_map(|raw| split_type(raw));
        Taxonomy::classify(tokens)
    }

    pub fn primary_shape(&self) -> Option<&str> {
        self.shape.as_ref()?.first().map(String::as_str)
    }
}

/// Rewrites a catalog shape path into the path the renderer loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRewrite {
    pub from_extension: String,
    pub to_extension: String,
}

impl Default for ShapeRewrite {
    fn default() -> Self {
        Self {
            from_extension: "obj".into(),
            to_extension: "glb".into(),
        }
    }
}

impl ShapeRewrite {
    /// Swap the extension and root the path with `/`.
    pub fn apply(&self, shape: &str) -> String {
        let shape = shape.replace('\\', "/");
        let rewritten = match shape.rsplit_once('.') {
            Some((stem, ext)) if ext.eq_ignore_ascii_case(&self.from_extension) => {
                format!("{stem}.{}", self.to_extension)
            }
            _ => shape,
        };

        if rewritten.starts_with('/') {
            rewritten
        } else {
            format!("/{rewritten}")
        }
    }

    /// Model path for an optional match; empty when there is none.
    pub fn model_path(&self, entry: Option<&MeshEntry>) -> String {
        entry
            .and_then(MeshEntry::primary_shape)
            .map(|shape| self.apply(shape))
            .unwrap_or_default()
    }
}

/// Static catalog of candidate meshes, in file order.
#[derive(Debug, Clone, Default)]
pub struct MeshLibrary {
    entries: Vec<Arc<MeshEntry>>,
}

impl MeshLibrary {
    /// Build from `(category, entries)` groups.
    pub fn from_categories<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<MeshEntry>)>,
    {
        let entries = categories
            .into_iter()
            .flat_map(|(category, entries)| {
                entries.into_iter().map(move |mut entry| {
                    entry.category = category.clone();
                    Arc::new(entry)
                })
            })
            .collect();
        Self { entries }
    }

    /// Parse a catalog: a JSON object mapping category keys to entry lists.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut categories = Vec::with_capacity(root.len());
        for (category, value) in root {
            let entries: Vec<MeshEntry> = serde_json::from_value(value).map_err(|source| {
                CatalogError::Category {
                    category: category.clone(),
                    source,
                }
            })?;
            categories.push((category, entries));
        }

        let library = Self::from_categories(categories);
        tracing::debug!(entries = library.len(), "Loaded mesh catalog");
        Ok(library)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<MeshEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
