//! Timestamp marker lines: `#<seconds>[.<fraction>]`.

use crate::header::ReferenceFrame;
use serde::Serialize;

pub const TIMESTAMP_MARKER: char = '#';

/// Batch offset from the header's reference time.
///
/// `ms` holds the first two fractional digits (hundredths of a second), so
/// `#5.1` and `#5.10` both give `ms == 10`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FrameOffset {
    pub seconds: u64,
    pub ms: u32,
}

impl FrameOffset {
    /// Offset in milliseconds, saturating at `i64::MAX`.
    pub fn as_millis(&self) -> i64 {
        i64::try_from(self.seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
            .saturating_add(i64::from(self.ms) * 10)
    }

    /// Absolute epoch milliseconds; relative to 0 when the reference time is unknown.
    pub fn absolute_millis(&self, frame: &ReferenceFrame) -> i64 {
        frame.reference_millis().saturating_add(self.as_millis())
    }
}

pub fn is_timestamp_line(line: &str) -> bool {
    line.trim_start().starts_with(TIMESTAMP_MARKER)
}

/// Parse a marker line. Digits past the second fractional place are dropped.
///
/// Markers whose offset does not fit in `i64` milliseconds are malformed.
pub fn parse_timestamp(line: &str) -> Option<FrameOffset> {
    let body = line.trim().strip_prefix(TIMESTAMP_MARKER)?;
    let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }

    let seconds = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let ms = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u32>().ok()? * 10,
        _ => fraction[..2].parse().ok()?,
    };

    i64::try_from(seconds).ok()?.checked_mul(1000)?.checked_add(i64::from(ms) * 10)?;
    Some(FrameOffset { seconds, ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse_header;

    #[test]
    fn parses_two_digit_fraction() {
        assert_eq!(parse_timestamp("#12.34"), Some(FrameOffset { seconds: 12, ms: 34 }));
    }

    #[test]
    fn scales_single_digit_fraction() {
        assert_eq!(parse_timestamp("#5.1"), Some(FrameOffset { seconds: 5, ms: 10 }));
    }

    #[test]
    fn whole_seconds_and_truncation() {
        assert_eq!(parse_timestamp("#7"), Some(FrameOffset { seconds: 7, ms: 0 }));
        assert_eq!(parse_timestamp("#7.\r"), Some(FrameOffset { seconds: 7, ms: 0 }));
        assert_eq!(parse_timestamp("#0.987"), Some(FrameOffset { seconds: 0, ms: 98 }));
        assert_eq!(parse_timestamp("#.5"), Some(FrameOffset { seconds: 0, ms: 50 }));
    }

    #[test]
    fn rejects_malformed_markers() {
        assert_eq!(parse_timestamp("12.34"), None);
        assert_eq!(parse_timestamp("#"), None);
        assert_eq!(parse_timestamp("#-3"), None);
        assert_eq!(parse_timestamp("#1.2.3"), None);
        assert_eq!(parse_timestamp("#abc"), None);
    }

    #[test]
    fn rejects_offsets_past_the_millisecond_range() {
        assert_eq!(parse_timestamp("#99999999999999999"), None);
        assert_eq!(parse_timestamp("#99999999999999999999999"), None);
        let largest = parse_timestamp("#9223372036854774.99").unwrap();
        assert_eq!(largest.as_millis(), 9_223_372_036_854_774_990);
        assert_eq!(parse_timestamp("#9223372036854775.99"), None);
    }

    #[test]
    fn oversized_offsets_saturate() {
        let offset = FrameOffset { seconds: u64::MAX, ms: 99 };
        assert_eq!(offset.as_millis(), i64::MAX);
        let frame = parse_header("ReferenceTime=2020-01-01T00:00:00Z");
        assert_eq!(offset.absolute_millis(&frame), i64::MAX);
    }

    #[test]
    fn combines_with_reference_time() {
        let frame = parse_header("ReferenceTime=2020-01-01T00:00:00Z");
        let offset = parse_timestamp("#12.34").unwrap();
        assert_eq!(offset.as_millis(), 12_340);
        assert_eq!(offset.absolute_millis(&frame), 1_577_836_812_340);
        assert_eq!(offset.absolute_millis(&ReferenceFrame::default()), 12_340);
    }
}
