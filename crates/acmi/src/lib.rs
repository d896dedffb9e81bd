//! ACMI: line-oriented telemetry for tactical simulation replays.
//!
//! - A header block of `Key=Value` lines fixes the session reference frame
//!   (origin longitude/latitude, reference time, format version, title).
//! - Each following line updates one entity: `<id>,<Key=Value>,<Key=Value>,...`.
//! - Positions are offsets from the reference origin and may omit any field;
//!   omitted fields carry over from the entity's previous pose.
//! - Lines starting with `#` carry the batch-relative timestamp.
//!
//! Stream layout:
//!   FileType=text/acmi
//!   FileVersion=2.2
//!   0,ReferenceTime=2020-01-01T00:00:00Z
//!   0,ReferenceLongitude=30
//!   0,ReferenceLatitude=45
//!   0,Title=Exercise1:notes
//!   #0
//!   7fe,T=0.001|0.002|500|1|2|10|20|30,Name=F16,Type=Air+FixedWing
//!   #0.5
//!   7fe,T=0.0011|0.0021|510
//!   -7fe,
//!
//! A removal line keeps its `,` separator; a bare `-7fe` has no field list
//! and is skipped as undecodable.
//!
//! Transform field (`T=`), `|`-delimited:
//!   3 tokens : lon_offset|lat_offset|alt
//!   5 tokens : lon_offset|lat_offset|alt|u|v              (orientation carried over)
//!   6 tokens : lon_offset|lat_offset|alt|roll|pitch|yaw
//!   8 tokens : lon_offset|lat_offset|alt|u|v|roll|pitch|yaw
//!   9 tokens : lon_offset|lat_offset|alt|roll|pitch|yaw|u|v|heading
//!
//! Decoding state lives in [`CoordinateState`], owned by the caller; nothing
//! in this crate is process-global.

pub mod coords;
pub mod error;
pub mod header;
pub mod id;
pub mod record;
pub mod timestamp;

pub use coords::{CoordinateState, Pose, BLANK_TRANSFORM};
pub use error::RecordError;
pub use header::{parse_header, ReferenceFrame};
pub use id::{EntityId, REMOVAL_SENTINEL};
pub use record::{parse_record, EntityUpdate, ParseMode};
pub use timestamp::{is_timestamp_line, parse_timestamp, FrameOffset, TIMESTAMP_MARKER};
