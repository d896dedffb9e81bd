//! Per-entity pose reconstruction from elliptical transform tuples.
//!
//! Every call resolves a tuple against the entity's last-known pose: fields that
//! are missing, malformed, or non-finite keep their previous value, so a stored
//! pose never holds `NaN`.

use crate::header::ReferenceFrame;
use crate::id::EntityId;
use serde::Serialize;
use std::collections::HashMap;

/// Tuple used when a record has no transform field at all.
pub const BLANK_TRANSFORM: [&str; 6] = [""; 6];

/// Absolute position and orientation. Degrees for angles, meters for altitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn is_finite(&self) -> bool {
        [
            self.longitude,
            self.latitude,
            self.altitude,
            self.roll,
            self.pitch,
            self.yaw,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Shape of a transform tuple, keyed by its arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransformLayout {
    /// `lon|lat|alt`
    Position,
    /// `lon|lat|alt|u|v`; the flat coordinates do not feed orientation.
    PositionFlat,
    /// `lon|lat|alt|roll|pitch|yaw`
    Oriented,
    /// `lon|lat|alt|roll|pitch|yaw|u|v|heading`
    OrientedFlat,
    /// `lon|lat|alt|u|v|roll|pitch|yaw`
    FlatOriented,
}

impl TransformLayout {
    fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            3 => Some(Self::Position),
            5 => Some(Self::PositionFlat),
            6 => Some(Self::Oriented),
            8 => Some(Self::FlatOriented),
            9 => Some(Self::OrientedFlat),
            _ => None,
        }
    }

    /// Index of the roll token, if the layout carries orientation.
    fn orientation_at(self) -> Option<usize> {
        match self {
            Self::Position | Self::PositionFlat => None,
            Self::Oriented | Self::OrientedFlat => Some(3),
            Self::FlatOriented => Some(5),
        }
    }
}

#[inline]
fn component(token: &str) -> f64 {
    leading_number(token)
}

/// Reads the decimal number at the start of `text` and ignores any trailing
/// unit or junk, so `"500m"` is 500. `NaN` when no number leads the text.
pub(crate) fn leading_number(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };

    let start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(start);
    let mut seen_digits = end > start;
    if bytes.get(end) == Some(&b'.') {
        let fraction_end = digits_from(end + 1);
        if seen_digits || fraction_end > end + 1 {
            seen_digits = true;
            end = fraction_end;
        }
    }
    if !seen_digits {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exponent_end = digits_from(end + 1 + sign);
        if exponent_end > end + 1 + sign {
            end = exponent_end;
        }
    }

    text[..end].parse().unwrap_or(f64::NAN)
}

#[inline]
fn finite_or(value: f64, previous: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        previous
    }
}

/// Resolve one tuple against `previous`. Unsupported arities keep `previous` whole.
fn resolve(tokens: &[&str], frame: &ReferenceFrame, previous: &Pose) -> Pose {
    let Some(layout) = TransformLayout::from_arity(tokens.len()) else {
        tracing::trace!(arity = tokens.len(), "Rejecting transform tuple");
        return *previous;
    };

    let mut pose = *previous;
    pose.longitude = finite_or(
        component(tokens[0]) + frame.reference_longitude,
        previous.longitude,
    );
    pose.latitude = finite_or(
        component(tokens[1]) + frame.reference_latitude,
        previous.latitude,
    );
    pose.altitude = finite_or(component(tokens[2]), previous.altitude);

    if let Some(at) = layout.orientation_at() {
        pose.roll = finite_or(component(tokens[at]), previous.roll);
        pose.pitch = finite_or(component(tokens[at + 1]), previous.pitch);
        pose.yaw = finite_or(component(tokens[at + 2]), previous.yaw);
    }

    pose
}

/// Last-known pose per entity for one session (or one decode partition).
///
/// Grows for the lifetime of the session; entities are never evicted.
#[derive(Debug, Default)]
pub struct CoordinateState {
    poses: HashMap<EntityId, Pose>,
}

impl CoordinateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `tokens` for `id`, store the result, and return a copy of it.
    ///
    /// An id seen for the first time starts from the all-zero pose.
    pub fn decode_pose(&mut self, id: &EntityId, tokens: &[&str], frame: &ReferenceFrame) -> Pose {
        match self.poses.get_mut(id.as_str()) {
            Some(stored) => {
                *stored = resolve(tokens, frame, stored);
                *stored
            }
            None => {
                let pose = resolve(tokens, frame, &Pose::default());
                self.poses.insert(id.clone(), pose);
                pose
            }
        }
    }

    /// Keep the stored pose for `id` as is, registering the id if it is new.
    pub fn carry_forward(&mut self, id: &EntityId, frame: &ReferenceFrame) -> Pose {
        self.decode_pose(id, &BLANK_TRANSFORM, frame)
    }

    pub fn get(&self, id: &str) -> Option<&Pose> {
        self.poses.get(id)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ReferenceFrame {
        ReferenceFrame {
            reference_longitude: 30.0,
            reference_latitude: 45.0,
            ..ReferenceFrame::default()
        }
    }

    fn id(raw: &str) -> EntityId {
        EntityId::sanitize(raw)
    }

    #[test]
    fn full_tuple_sets_every_field() {
        let mut state = CoordinateState::new();
        let pose = state.decode_pose(
            &id("7fe"),
            &["0.001", "0.002", "500", "1", "2", "10", "20", "30", "40"],
            &frame(),
        );
        assert!((pose.longitude - 30.001).abs() < 1e-9);
        assert!((pose.latitude - 45.002).abs() < 1e-9);
        assert_eq!(pose.altitude, 500.0);
        assert_eq!((pose.roll, pose.pitch, pose.yaw), (1.0, 2.0, 10.0));
    }

    #[test]
    fn eight_tokens_read_orientation_after_flat_coordinates() {
        let mut state = CoordinateState::new();
        let pose = state.decode_pose(
            &id("7fe"),
            &["0.001", "0.002", "500", "1", "2", "10", "20", "30"],
            &frame(),
        );
        assert_eq!(pose.altitude, 500.0);
        assert_eq!((pose.roll, pose.pitch, pose.yaw), (10.0, 20.0, 30.0));
    }

    #[test]
    fn position_only_keeps_orientation() {
        let mut state = CoordinateState::new();
        let e = id("a1");
        state.decode_pose(&e, &["0", "0", "100", "5", "6", "7"], &frame());

        let pose = state.decode_pose(&e, &["1", "2", "200"], &frame());
        assert_eq!((pose.longitude, pose.latitude, pose.altitude), (31.0, 47.0, 200.0));
        assert_eq!((pose.roll, pose.pitch, pose.yaw), (5.0, 6.0, 7.0));
    }

    #[test]
    fn five_tokens_ignore_flat_coordinates() {
        let mut state = CoordinateState::new();
        let e = id("a1");
        state.decode_pose(&e, &["0", "0", "0", "5", "6", "7"], &frame());

        let pose = state.decode_pose(&e, &["0.5", "0.5", "10", "1234", "5678"], &frame());
        assert_eq!(pose.altitude, 10.0);
        assert_eq!((pose.roll, pose.pitch, pose.yaw), (5.0, 6.0, 7.0));
    }

    #[test]
    fn omitted_fields_fall_back_per_field() {
        let mut state = CoordinateState::new();
        let e = id("a1");
        state.decode_pose(&e, &["1", "1", "100", "5", "6", "7"], &frame());

        let pose = state.decode_pose(&e, &["", "2", "", "", "", "9"], &frame());
        assert_eq!(pose.longitude, 31.0);
        assert_eq!(pose.latitude, 47.0);
        assert_eq!(pose.altitude, 100.0);
        assert_eq!((pose.roll, pose.pitch, pose.yaw), (5.0, 6.0, 9.0));
    }

    #[test]
    fn unsupported_arity_keeps_previous_pose() {
        let mut state = CoordinateState::new();
        let e = id("a1");
        let before = state.decode_pose(&e, &["1", "1", "100"], &frame());

        let rejected: [&[&str]; 4] = [&["9", "9"], &["9"; 4], &["9"; 7], &[]];
        for tokens in rejected {
            assert_eq!(state.decode_pose(&e, tokens, &frame()), before);
        }
    }

    #[test]
    fn blank_tuple_carries_pose_forward() {
        let mut state = CoordinateState::new();
        let e = id("a1");
        let before = state.decode_pose(&e, &["1", "1", "100", "5", "6", "7"], &frame());
        assert_eq!(state.carry_forward(&e, &frame()), before);
    }

    #[test]
    fn first_sighting_starts_from_zero() {
        let mut state = CoordinateState::new();
        let pose = state.carry_forward(&id("new"), &frame());
        assert_eq!(pose, Pose::default());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn nan_origin_degrades_to_previous() {
        let broken = ReferenceFrame {
            reference_longitude: f64::NAN,
            reference_latitude: f64::NAN,
            ..ReferenceFrame::default()
        };
        let mut state = CoordinateState::new();
        let e = id("a1");
        state.decode_pose(&e, &["1", "1", "100"], &frame());

        let pose = state.decode_pose(&e, &["2", "2", "200", "inf", "x", "3"], &broken);
        assert!(pose.is_finite());
        assert_eq!((pose.longitude, pose.latitude), (31.0, 46.0));
        assert_eq!(pose.altitude, 200.0);
        assert_eq!((pose.roll, pose.pitch, pose.yaw), (0.0, 0.0, 3.0));
    }

    #[test]
    fn components_read_their_leading_number() {
        assert_eq!(leading_number("500m"), 500.0);
        assert_eq!(leading_number(" -30deg"), -30.0);
        assert_eq!(leading_number("1.5e2ft"), 150.0);
        assert_eq!(leading_number("2e"), 2.0);
        assert_eq!(leading_number("5."), 5.0);
        assert_eq!(leading_number(".25"), 0.25);
        assert!(leading_number("").is_nan());
        assert!(leading_number("-.").is_nan());
        assert!(leading_number("deg30").is_nan());

        let mut state = CoordinateState::new();
        let pose = state.decode_pose(&id("a1"), &["1", "1", "500m", "10deg", "x", "3"], &frame());
        assert_eq!((pose.altitude, pose.roll, pose.pitch, pose.yaw), (500.0, 10.0, 0.0, 3.0));
    }

    #[test]
    fn ids_are_isolated() {
        let mut state = CoordinateState::new();
        state.decode_pose(&id("a"), &["1", "1", "100"], &frame());
        let other = state.carry_forward(&id("b"), &frame());
        assert_eq!(other, Pose::default());
        assert_eq!(state.get("a").map(|p| p.altitude), Some(100.0));
    }
}
