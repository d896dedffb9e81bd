use crate::library::{MeshEntry, MeshLibrary};
use crate::taxonomy::{clean_token, Taxonomy};
use std::sync::Arc;

/// Type string that disables taxonomy filtering.
pub const ANY_TYPE: &str = "++";

/// Candidate display name that matches any entity name.
pub const WILDCARD_NAME: &str = "*";

const WILDCARD_SCORE: usize = 1;

/// Resolves an entity's `(Type, Name)` to a catalog entry.
pub trait MeshResolver: Send + Sync {
    fn resolve(&self, kind: &str, name: &str) -> Option<Arc<MeshEntry>>;
}

/// Ordered character overlap: the candidate pointer always advances, the target
/// pointer only on a match.
pub fn overlap_score(candidate: &str, target: &str) -> usize {
    let mut target_chars = target.chars().peekable();
    let mut count = 0;

    for c in candidate.chars() {
        match target_chars.peek() {
            Some(&t) if t == c => {
                count += 1;
                target_chars.next();
            }
            Some(_) => {}
            None => break,
        }
    }

    count
}

fn name_score(names: &[String], target: &str) -> usize {
    names
        .iter()
        .map(|name| {
            let name = clean_token(name);
            if name == WILDCARD_NAME {
                WILDCARD_SCORE
            } else {
                overlap_score(&name, target)
            }
        })
        .max()
        .unwrap_or(0)
}

/// Uncached matcher over a fixed library.
#[derive(Debug, Clone)]
pub struct MeshMatcher {
    library: Arc<MeshLibrary>,
}

impl MeshMatcher {
    pub fn new(library: Arc<MeshLibrary>) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &MeshLibrary {
        &self.library
    }

    /// Best entry for `kind`/`name`, or `None` when nothing scores above zero.
    ///
    /// Ties keep the candidate seen first in catalog order.
    pub fn find_best_mesh(&self, kind: &str, name: &str) -> Option<Arc<MeshEntry>> {
        let any_type = kind == ANY_TYPE;
        let target = Taxonomy::from_type_string(kind);
        let target_name = clean_token(name);

        let mut best = None;
        let mut best_score = 0;

        for entry in self.library.entries() {
            let Some(names) = entry.name.as_deref() else {
                continue;
            };
            if entry.kind.is_none() {
                continue;
            }
            if !any_type && !entry.taxonomy().accepts(&target) {
                continue;
            }

            let score = name_score(names, &target_name);
            if score > best_score {
                best_score = score;
                best = Some(Arc::clone(entry));
            }
        }

        if best.is_none() {
            tracing::debug!(kind, name, "No mesh matched");
        }
        best
    }
}

impl MeshResolver for MeshMatcher {
    fn resolve(&self, kind: &str, name: &str) -> Option<Arc<MeshEntry>> {
        self.find_best_mesh(kind, name)
    }
}
