use acmi::{EntityId, EntityUpdate, Pose};
use serde::Serialize;
use std::collections::BTreeMap;

/// Fields captured the first time an id is seen. Later records do not change them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StaticFields {
    pub name: String,
    pub kind: String,
    pub color: String,
    /// Model path resolved from the mesh catalog; empty when nothing matched.
    pub shape: String,
    pub coalition: String,
    pub call_sign: String,
    pub is_cgf: bool,
    pub engagement_range: i64,
    pub vertical_engagement_range: i64,
    /// Unknown keys passed through by lenient decoding.
    pub attributes: BTreeMap<String, String>,
}

/// Fields refreshed by every record for an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicFields {
    pub pose: Pose,
    pub visible: bool,
    pub debug: Option<String>,
    /// Batch timestamp in epoch milliseconds.
    pub time: i64,
}

impl Default for DynamicFields {
    fn default() -> Self {
        Self {
            pose: Pose::default(),
            visible: true,
            debug: None,
            time: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(flatten)]
    pub statics: StaticFields,
    #[serde(flatten)]
    pub dynamics: DynamicFields,
    /// Whether this frame explicitly set `Visible` (or hid the entity).
    #[serde(skip)]
    pub visibility_set: bool,
}

impl EntityRecord {
    /// Full frame for one decoded line. `shape` is left for the merge step.
    pub fn from_update(update: EntityUpdate, time: i64) -> Self {
        let attributes = update.extra.into_iter().collect();
        Self {
            statics: StaticFields {
                name: update.name.unwrap_or_default(),
                kind: update.kind.unwrap_or_default(),
                color: update.color.unwrap_or_default(),
                shape: String::new(),
                coalition: update.coalition.unwrap_or_default(),
                call_sign: update.call_sign.unwrap_or_default(),
                is_cgf: update.is_cgf.unwrap_or(true),
                engagement_range: update.engagement_range.unwrap_or(0),
                vertical_engagement_range: update.vertical_engagement_range.unwrap_or(0),
                attributes,
            },
            dynamics: DynamicFields {
                pose: update.pose,
                visible: update.visible.unwrap_or(true),
                debug: update.debug,
                time,
            },
            visibility_set: update.visible.is_some(),
            id: update.id,
        }
    }

    /// Apply `frame` on top of this record: statics stay, dynamics are replaced.
    ///
    /// Visibility and debug text persist until a frame sets them again.
    pub fn advance(&self, frame: &EntityRecord) -> EntityRecord {
        let dynamics = DynamicFields {
            pose: frame.dynamics.pose,
            visible: if frame.visibility_set {
                frame.dynamics.visible
            } else {
                self.dynamics.visible
            },
            debug: frame
                .dynamics
                .debug
                .clone()
                .or_else(|| self.dynamics.debug.clone()),
            time: frame.dynamics.time,
        };

        EntityRecord {
            id: self.id.clone(),
            statics: self.statics.clone(),
            dynamics,
            visibility_set: frame.visibility_set,
        }
    }
}
