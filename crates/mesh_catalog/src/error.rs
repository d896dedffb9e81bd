use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read mesh catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("mesh catalog is not a JSON object of categories: {0}")]
    Json(#[from] serde_json::Error),

    #[error("category {category:?} is not a list of mesh entries: {source}")]
    Category {
        category: String,
        #[source]
        source: serde_json::Error,
    },
}
