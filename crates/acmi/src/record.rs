//! Entity records: `<rawId>,<Key=Value>,<Key=Value>,...`

use crate::coords::{CoordinateState, Pose};
use crate::error::RecordError;
use crate::header::ReferenceFrame;
use crate::id::EntityId;
use crate::timestamp::TIMESTAMP_MARKER;
use serde::Serialize;

/// How unrecognised keys are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Only known keys are kept.
    #[default]
    Strict,
    /// Unknown keys are kept verbatim in [`EntityUpdate::extra`].
    Lenient,
}

/// One decoded line: the fields it carried plus the entity's resolved pose.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityUpdate {
    pub id: EntityId,
    /// Raw id carried the removal sentinel.
    pub removed: bool,
    pub name: Option<String>,
    /// The `Type` field, e.g. `Air+FixedWing`.
    pub kind: Option<String>,
    pub color: Option<String>,
    pub coalition: Option<String>,
    pub call_sign: Option<String>,
    /// `Some(false)` when a call sign is present.
    pub is_cgf: Option<bool>,
    pub visible: Option<bool>,
    pub engagement_range: Option<i64>,
    pub vertical_engagement_range: Option<i64>,
    pub debug: Option<String>,
    pub pose: Pose,
    pub extra: Vec<(String, String)>,
}

type FieldSetter = fn(&mut EntityUpdate, &str);

const TRANSFORM_KEY: &str = "T";

const RECORD_FIELDS: &[(&str, FieldSetter)] = &[
    ("Name", |update, value| update.name = Some(value.to_owned())),
    ("Type", |update, value| update.kind = Some(value.to_owned())),
    ("Color", |update, value| update.color = Some(value.to_owned())),
    ("Coalition", |update, value| {
        update.coalition = Some(value.to_owned())
    }),
    ("CallSign", |update, value| {
        update.call_sign = Some(value.to_owned());
        update.is_cgf = Some(false);
    }),
    ("Visible", |update, value| {
        update.visible = Some(parse_visible(value))
    }),
    ("VerticalEngagementRange", |update, value| {
        update.vertical_engagement_range = Some(parse_range(value))
    }),
    ("EngagementRange", |update, value| {
        update.engagement_range = Some(parse_range(value))
    }),
    ("Debug", |update, value| update.debug = Some(value.to_owned())),
];

fn parse_visible(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Leading integer of `value`; empty or malformed input is 0.
fn parse_range(value: &str) -> i64 {
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && matches!(c, '-' | '+'))))
        .map_or(value.len(), |(i, _)| i);
    value[..end].parse().unwrap_or(0)
}

/// Decode one telemetry line.
///
/// The pose is always resolved through `coords`: a record without `T=` carries
/// the entity's previous pose forward.
pub fn parse_record(
    line: &str,
    frame: &ReferenceFrame,
    coords: &mut CoordinateState,
    mode: ParseMode,
) -> Result<EntityUpdate, RecordError> {
    let line = line.trim();
    if line.starts_with(TIMESTAMP_MARKER) {
        return Err(RecordError::TimestampMarker(line.to_owned()));
    }

    let (raw_id, fields) = line
        .split_once(',')
        .ok_or_else(|| RecordError::MissingId(line.to_owned()))?;

    let id = EntityId::sanitize(raw_id);
    if id.is_empty() {
        return Err(RecordError::EmptyId);
    }

    let mut update = EntityUpdate {
        removed: EntityId::is_removal(raw_id),
        ..EntityUpdate::default()
    };
    let mut transform = None;

    for field in fields.split(',') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        if key == TRANSFORM_KEY {
            transform = Some(value);
        } else if let Some((_, set)) = RECORD_FIELDS.iter().find(|(name, _)| *name == key) {
            set(&mut update, value);
        } else if mode == ParseMode::Lenient {
            update.extra.push((key.to_owned(), value.to_owned()));
        }
    }

    update.pose = match transform {
        Some(tuple) => {
            let tokens: Vec<&str> = tuple.split('|').collect();
            coords.decode_pose(&id, &tokens, frame)
        }
        None => coords.carry_forward(&id, frame),
    };

    if update.removed {
        update.visible = Some(false);
    }
    update.id = id;

    Ok(update)
}
