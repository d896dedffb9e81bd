use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;

/// Leading character of a raw id that marks the entity as removed.
pub const REMOVAL_SENTINEL: char = '-';

/// Canonical entity key.
///
/// Only constructed through [`EntityId::sanitize`], so two raw ids that differ
/// only by the removal sentinel or a trailing `\r` map to the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn sanitize(raw: &str) -> Self {
        let raw = raw.trim_start();
        let raw = raw.strip_prefix(REMOVAL_SENTINEL).unwrap_or(raw);
        Self(raw.trim_end_matches(|c: char| c.is_control()).to_owned())
    }

    /// Whether a raw id carries the removal sentinel.
    pub fn is_removal(raw: &str) -> bool {
        raw.trim_start().starts_with(REMOVAL_SENTINEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn strips_sentinel_and_carriage_return() {
        assert_eq!(EntityId::sanitize("-AB12\r").as_str(), "AB12");
        assert_eq!(EntityId::sanitize("AB12").as_str(), "AB12");
        assert!(EntityId::is_removal("-AB12\r"));
        assert!(!EntityId::is_removal("AB12"));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = EntityId::sanitize("-7fe\r");
        let twice = EntityId::sanitize(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn looks_up_by_str() {
        let mut map = HashMap::new();
        map.insert(EntityId::sanitize("-7fe"), 1);
        assert_eq!(map.get("7fe"), Some(&1));
    }
}
