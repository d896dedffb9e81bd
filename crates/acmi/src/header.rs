//! Session header: the `Key=Value` block that precedes the first timestamp marker.

use crate::coords::leading_number;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Reference frame shared by every record of one session.
///
/// Longitude/latitude that fail to parse are stored as `NaN`; the pose decoder
/// absorbs them through its per-field fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceFrame {
    pub file_type: String,
    pub file_version: String,
    /// `ReferenceTime` exactly as it appeared in the header.
    pub reference_time: String,
    /// `ReferenceTime` parsed as RFC 3339, if it was valid.
    pub reference_timestamp: Option<DateTime<Utc>>,
    pub reference_longitude: f64,
    pub reference_latitude: f64,
    pub title: Option<String>,
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self {
            file_type: String::new(),
            file_version: String::new(),
            reference_time: String::new(),
            reference_timestamp: None,
            reference_longitude: 0.0,
            reference_latitude: 0.0,
            title: None,
        }
    }
}

impl ReferenceFrame {
    /// The scenario name: the part of `Title` before the first `:`.
    pub fn scenario_name(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(|title| title.split(':').next().unwrap_or(title))
    }

    /// Whether both origin coordinates parsed to finite numbers.
    pub fn has_finite_origin(&self) -> bool {
        self.reference_longitude.is_finite() && self.reference_latitude.is_finite()
    }

    /// Reference time as epoch milliseconds, or 0 when it did not parse.
    pub fn reference_millis(&self) -> i64 {
        self.reference_timestamp
            .map_or(0, |timestamp| timestamp.timestamp_millis())
    }
}

type HeaderSetter = fn(&mut ReferenceFrame, &str);

// Keys are matched by containment so `0,ReferenceTime` resolves like `ReferenceTime`.
// First entry whose name is contained in the key wins.
const HEADER_FIELDS: &[(&str, HeaderSetter)] = &[
    ("FileType", |frame, value| frame.file_type = value.to_owned()),
    ("FileVersion", |frame, value| frame.file_version = value.to_owned()),
    ("ReferenceTime", |frame, value| {
        frame.reference_time = value.to_owned();
        frame.reference_timestamp = DateTime::parse_from_rfc3339(value.trim())
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .ok();
    }),
    ("ReferenceLongitude", |frame, value| {
        frame.reference_longitude = parse_degrees(value)
    }),
    ("ReferenceLatitude", |frame, value| {
        frame.reference_latitude = parse_degrees(value)
    }),
    ("Title", |frame, value| frame.title = Some(value.to_owned())),
];

#[inline]
fn parse_degrees(value: &str) -> f64 {
    leading_number(value)
}

/// Parse a header block into a [`ReferenceFrame`].
///
/// Lines without `=` and unrecognised keys are ignored. Values keep everything
/// after the first `=`.
pub fn parse_header(block: &str) -> ReferenceFrame {
    let mut frame = ReferenceFrame::default();

    for line in block.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let value = value.trim_end_matches(|c: char| c.is_control());
        if let Some((_, set)) = HEADER_FIELDS.iter().find(|(name, _)| key.contains(name)) {
            set(&mut frame, value);
        } else {
            tracing::trace!(key, "Ignoring unrecognised header key");
        }
    }

    frame
}
