//! Concurrent ingestion of ACMI telemetry into a shared entity table.
//!
//! Chunks of complete lines enter an [`IngestionPipeline`]. The header block
//! is parsed once, records are decoded either inline or on a pool of decode
//! workers (each id always routed to the same worker, which owns that id's
//! pose history), new entities are resolved to a model path, and the chunk is
//! committed to the [`EntityTable`] as one coalesced version change.

pub mod error;
pub mod merge;
pub mod pipeline;
pub mod record;
pub mod table;
pub mod worker;

pub use error::IngestError;
pub use merge::{commit, fold_frames, MergeOutcome, ShapeResolver};
pub use pipeline::{ChunkReport, IngestionPipeline, PipelineConfig, PipelineStats};
pub use record::{DynamicFields, EntityRecord, StaticFields};
pub use table::EntityTable;
pub use worker::{route_key, shard_for, DecodePool, DecodeRequest, DecodeResponse, Decoder};
