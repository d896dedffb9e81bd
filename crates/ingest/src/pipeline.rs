use crate::error::IngestError;
use crate::merge::{commit, fold_frames, ShapeResolver};
use crate::table::EntityTable;
use crate::worker::{route_key, shard_for, DecodePool, DecodeRequest, DecodeResponse, Decoder};
use acmi::{is_timestamp_line, parse_header, parse_timestamp, FrameOffset, ParseMode, ReferenceFrame};
use mesh_catalog::{MeshResolver, ShapeRewrite};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Configuration for an [`IngestionPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Decode worker tasks. `0` decodes on the calling task.
    pub decode_workers: usize,
    /// Requests queued per worker before submission waits.
    pub queue_capacity: usize,
    pub parse_mode: ParseMode,
    pub shape_rewrite: ShapeRewrite,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode_workers: 0,
            queue_capacity: 16,
            parse_mode: ParseMode::Lenient,
            shape_rewrite: ShapeRewrite::default(),
        }
    }
}

/// What one call to [`IngestionPipeline::ingest_chunk`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    /// Non-empty lines after the header, timestamp markers included.
    pub lines: usize,
    pub frames: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Record lines and timestamp markers that could not be decoded.
    pub skipped: usize,
    /// Batch-level decode failures. The rest of the chunk was still applied.
    pub errors: Vec<String>,
    /// Table version published for this chunk.
    pub version: Option<u64>,
}

/// Running totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub chunks: u64,
    pub lines: u64,
    pub frames: u64,
    pub skipped: u64,
    pub batch_errors: u64,
}

enum HeaderState {
    Pending(String),
    Ready(Arc<ReferenceFrame>),
}

enum Decoding {
    Inline(Decoder),
    Pool(DecodePool),
}

/// Lines for one timestamp, split by decode shard.
struct Segment {
    timestamp: i64,
    shards: Vec<String>,
}

impl Segment {
    fn new(timestamp: i64, shards: usize) -> Self {
        Self {
            timestamp,
            shards: vec![String::new(); shards],
        }
    }

    fn requests(self, header: &Arc<ReferenceFrame>) -> impl Iterator<Item = (usize, DecodeRequest)> + '_ {
        let timestamp = self.timestamp;
        self.shards
            .into_iter()
            .enumerate()
            .filter(|(_, lines)| !lines.is_empty())
            .map(move |(shard, lines)| {
                (
                    shard,
                    DecodeRequest {
                        lines,
                        header: Arc::clone(header),
                        batch_timestamp: timestamp,
                    },
                )
            })
    }
}

/// Turns a session's chunks of complete lines into entity table updates.
///
/// The first lines of the stream, up to the first timestamp marker, are the
/// header; they may arrive over several chunks. Each following chunk is split
/// at timestamp markers, decoded (inline or on the worker pool, routed by id),
/// folded, and committed to the table as a single coalesced change.
pub struct IngestionPipeline {
    session_id: Uuid,
    config: PipelineConfig,
    table: Arc<EntityTable>,
    meshes: Option<Arc<dyn MeshResolver>>,
    header: HeaderState,
    offset: FrameOffset,
    decoding: Decoding,
    shutdown_rx: Option<watch::Receiver<()>>,
    closed: bool,
    stats: PipelineStats,
}

impl IngestionPipeline {
    /// Starts decode workers when `config.decode_workers > 0`, which requires a
    /// Tokio runtime.
    pub fn new(
        config: PipelineConfig,
        table: Arc<EntityTable>,
        meshes: Option<Arc<dyn MeshResolver>>,
    ) -> Self {
        let decoding = match config.decode_workers {
            0 => Decoding::Inline(Decoder::new(config.parse_mode)),
            workers => Decoding::Pool(DecodePool::spawn(
                workers,
                config.queue_capacity,
                config.parse_mode,
            )),
        };

        let session_id = Uuid::new_v4();
        tracing::info!(
            session = %session_id,
            decode_workers = config.decode_workers,
            "Ingestion session started"
        );

        Self {
            session_id,
            config,
            table,
            meshes,
            header: HeaderState::Pending(String::new()),
            offset: FrameOffset::default(),
            decoding,
            shutdown_rx: None,
            closed: false,
            stats: PipelineStats::default(),
        }
    }

    /// Abandon in-flight work once `shutdown_rx` changes or its sender is dropped.
    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn table(&self) -> &Arc<EntityTable> {
        &self.table
    }

    pub fn header(&self) -> Option<&ReferenceFrame> {
        match &self.header {
            HeaderState::Ready(frame) => Some(frame),
            HeaderState::Pending(_) => None,
        }
    }

    /// Offset of the most recent timestamp marker.
    pub fn offset(&self) -> FrameOffset {
        self.offset
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Ingest one chunk of complete, newline-terminated lines.
    ///
    /// Decode problems are reported in the [`ChunkReport`]. An error means the
    /// chunk was not applied: either shutdown fired while it was in flight, or
    /// an earlier chunk was already cancelled.
    pub async fn ingest_chunk(&mut self, chunk: &str) -> Result<ChunkReport, IngestError> {
        if self.closed {
            return Err(IngestError::Closed);
        }

        let lines: Vec<&str> = chunk.lines().collect();
        let mut report = ChunkReport::default();

        let Some((header, body)) = self.accept_header(&lines) else {
            return Ok(report);
        };

        let shards = match &self.decoding {
            Decoding::Inline(_) => 1,
            Decoding::Pool(pool) => pool.workers(),
        };
        let segments = self.segment(body, &header, shards, &mut report);

        let responses: Option<Vec<DecodeResponse>> = match &mut self.decoding {
            Decoding::Inline(decoder) => Some(
                segments
                    .into_iter()
                    .flat_map(|segment| segment.requests(&header).collect::<Vec<_>>())
                    .map(|(_, request)| decoder.decode(&request))
                    .collect(),
            ),
            Decoding::Pool(pool) => {
                let work = dispatch(pool, &header, segments);
                match self.shutdown_rx.as_mut() {
                    Some(shutdown_rx) => tokio::select! {
                        responses = work => Some(responses),
                        _ = shutdown_rx.changed() => None,
                    },
                    None => Some(work.await),
                }
            }
        };

        let Some(responses) = responses.filter(|_| !self.shutdown_signalled()) else {
            return Err(self.cancel());
        };

        let mut frames = Vec::new();
        for response in responses {
            report.skipped += response.skipped;
            if let Some(error) = response.error {
                tracing::warn!(
                    session = %self.session_id,
                    timestamp = response.timestamp,
                    error = %error,
                    "Decode batch failed"
                );
                report.errors.push(error);
            }
            frames.extend(response.frames);
        }
        report.frames = frames.len();

        let shapes = ShapeResolver {
            meshes: self.meshes.as_deref(),
            rewrite: &self.config.shape_rewrite,
        };
        let (merged, outcome) = fold_frames(&self.table, frames, &shapes);
        report.inserted = outcome.inserted;
        report.updated = outcome.updated;
        report.version = commit(&self.table, merged);

        self.stats.chunks += 1;
        self.stats.lines += report.lines as u64;
        self.stats.frames += report.frames as u64;
        self.stats.skipped += report.skipped as u64;
        self.stats.batch_errors += report.errors.len() as u64;

        tracing::debug!(
            session = %self.session_id,
            lines = report.lines,
            frames = report.frames,
            inserted = report.inserted,
            version = ?report.version,
            "Chunk applied"
        );
        Ok(report)
    }

    /// End of stream. Parses a header that never saw a timestamp marker and
    /// stops the decode workers.
    pub async fn finish(mut self) -> PipelineStats {
        if let HeaderState::Pending(block) = &self.header {
            if !block.trim().is_empty() {
                self.header = HeaderState::Ready(Arc::new(parse_header(block)));
                tracing::warn!(session = %self.session_id, "Stream ended inside the header block");
            }
        }

        if let Decoding::Pool(pool) = self.decoding {
            pool.shutdown().await;
        }

        tracing::info!(
            session = %self.session_id,
            chunks = self.stats.chunks,
            frames = self.stats.frames,
            entities = self.table.len(),
            "Ingestion session finished"
        );
        self.stats
    }

    /// Buffer header lines until the first timestamp marker. Returns the frame
    /// and the lines after the header once it is known.
    fn accept_header<'a>(
        &mut self,
        lines: &'a [&'a str],
    ) -> Option<(Arc<ReferenceFrame>, &'a [&'a str])> {
        let block = match &mut self.header {
            HeaderState::Ready(frame) => return Some((Arc::clone(frame), lines)),
            HeaderState::Pending(block) => block,
        };

        let Some(end) = lines.iter().position(|line| is_timestamp_line(line)) else {
            for line in lines {
                block.push_str(line);
                block.push('\n');
            }
            return None;
        };

        for line in &lines[..end] {
            block.push_str(line);
            block.push('\n');
        }

        let frame = Arc::new(parse_header(block));
        if !frame.has_finite_origin() {
            tracing::warn!(
                session = %self.session_id,
                "Header reference origin is not numeric; positions fall back to previous poses"
            );
        }
        tracing::info!(
            session = %self.session_id,
            file_type = %frame.file_type,
            file_version = %frame.file_version,
            scenario = frame.scenario_name().unwrap_or_default(),
            reference_time = %frame.reference_time,
            "Parsed stream header"
        );

        self.header = HeaderState::Ready(Arc::clone(&frame));
        Some((frame, &lines[end..]))
    }

    fn segment(
        &mut self,
        lines: &[&str],
        header: &ReferenceFrame,
        shards: usize,
        report: &mut ChunkReport,
    ) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut current = Segment::new(self.offset.absolute_millis(header), shards);

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            report.lines += 1;

            if is_timestamp_line(line) {
                match parse_timestamp(line) {
                    Some(offset) => {
                        self.offset = offset;
                        let next = Segment::new(offset.absolute_millis(header), shards);
                        segments.push(std::mem::replace(&mut current, next));
                    }
                    None => {
                        tracing::warn!(line, "Skipping malformed timestamp marker");
                        report.skipped += 1;
                    }
                }
                continue;
            }

            let shard = shard_for(&route_key(line), shards);
            let buffer = &mut current.shards[shard];
            buffer.push_str(line);
            buffer.push('\n');
        }

        segments.push(current);
        segments
    }

    fn shutdown_signalled(&self) -> bool {
        self.shutdown_rx
            .as_ref()
            .is_some_and(|rx| rx.has_changed().unwrap_or(true))
    }

    fn cancel(&mut self) -> IngestError {
        self.closed = true;
        tracing::info!(session = %self.session_id, "Ingestion cancelled; discarding in-flight chunk");
        IngestError::Cancelled
    }
}

/// Queue every request, then collect the responses in submission order.
async fn dispatch(
    pool: &DecodePool,
    header: &Arc<ReferenceFrame>,
    segments: Vec<Segment>,
) -> Vec<DecodeResponse> {
    let mut pending = Vec::new();
    for segment in segments {
        for (worker, request) in segment.requests(header) {
            let timestamp = request.batch_timestamp;
            let reply = pool.submit(worker, request).await;
            pending.push(async move {
                reply.await.unwrap_or_else(|_| {
                    DecodeResponse::failed(timestamp, format!("decode worker {worker} dropped the batch"))
                })
            });
        }
    }
    futures::future::join_all(pending).await
}
