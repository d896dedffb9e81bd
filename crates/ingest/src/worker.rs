use crate::record::EntityRecord;
use acmi::{is_timestamp_line, parse_record, CoordinateState, EntityId, ParseMode, ReferenceFrame};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// A batch of raw lines decoded against one reference frame and timestamp.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    /// Newline-separated record lines. Timestamp markers are skipped.
    pub lines: String,
    pub header: Arc<ReferenceFrame>,
    /// Absolute batch time in epoch milliseconds.
    pub batch_timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeResponse {
    pub frames: Vec<EntityRecord>,
    /// Echo of [`DecodeRequest::batch_timestamp`].
    pub timestamp: i64,
    /// Set when the batch could not be decoded at all.
    pub error: Option<String>,
    /// Lines dropped as undecodable.
    pub skipped: usize,
}

impl DecodeResponse {
    pub fn failed(timestamp: i64, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Sanitised id a record line will be keyed under, used for routing before
/// the line is decoded.
pub fn route_key(line: &str) -> EntityId {
    let raw = line.split(',').next().unwrap_or_default();
    EntityId::sanitize(raw)
}

/// Stable shard index for `id` among `shards` partitions.
pub fn shard_for(id: &EntityId, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// Single-owner decoder. Every id it sees keeps its pose history here, so all
/// lines for one id must reach the same `Decoder`.
#[derive(Debug, Default)]
pub struct Decoder {
    coords: CoordinateState,
    mode: ParseMode,
}

impl Decoder {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            coords: CoordinateState::new(),
            mode,
        }
    }

    pub fn tracked_ids(&self) -> usize {
        self.coords.len()
    }

    pub fn decode(&mut self, request: &DecodeRequest) -> DecodeResponse {
        let mut response = DecodeResponse {
            timestamp: request.batch_timestamp,
            ..DecodeResponse::default()
        };

        for line in request.lines.lines() {
            let line = line.trim();
            if line.is_empty() || is_timestamp_line(line) {
                continue;
            }

            match parse_record(line, &request.header, &mut self.coords, self.mode) {
                Ok(update) => response
                    .frames
                    .push(EntityRecord::from_update(update, request.batch_timestamp)),
                Err(e) => {
                    tracing::warn!(line, error = %e, "Skipping undecodable record");
                    response.skipped += 1;
                }
            }
        }

        response
    }
}

struct DecodeJob {
    request: DecodeRequest,
    reply: oneshot::Sender<DecodeResponse>,
}

/// Fixed set of decode workers, each on its own blocking thread with its own
/// [`Decoder`]. Callers pick the worker with [`shard_for`].
pub struct DecodePool {
    senders: Vec<mpsc::Sender<DecodeJob>>,
    handles: Vec<JoinHandle<()>>,
}

impl DecodePool {
    /// Must be called from inside a Tokio runtime.
    pub fn spawn(workers: usize, queue_capacity: usize, mode: ParseMode) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            senders.push(tx);
            handles.push(tokio::task::spawn_blocking(move || {
                run_worker(worker, rx, Decoder::new(mode))
            }));
        }

        tracing::debug!(workers, "Decode pool started");
        Self { senders, handles }
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Queue `request` on `worker`. The receiver yields the worker's response;
    /// a dead worker is reported as an errored response rather than a failure.
    pub async fn submit(
        &self,
        worker: usize,
        request: DecodeRequest,
    ) -> oneshot::Receiver<DecodeResponse> {
        let (reply, response_rx) = oneshot::channel();
        let timestamp = request.batch_timestamp;

        let Some(sender) = self.senders.get(worker) else {
            let _ = reply.send(DecodeResponse::failed(
                timestamp,
                format!("no decode worker {worker}"),
            ));
            return response_rx;
        };

        if let Err(mpsc::error::SendError(job)) = sender.send(DecodeJob { request, reply }).await {
            let _ = job.reply.send(DecodeResponse::failed(
                timestamp,
                format!("decode worker {worker} is not running"),
            ));
        }
        response_rx
    }

    /// Close every queue and wait for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.senders);
        for (worker, handle) in self.handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!(worker, error = %e, "Decode worker task failed");
            }
        }
    }
}

fn run_worker(worker: usize, mut rx: mpsc::Receiver<DecodeJob>, mut decoder: Decoder) {
    while let Some(job) = rx.blocking_recv() {
        let timestamp = job.request.batch_timestamp;
        let response = catch_unwind(AssertUnwindSafe(|| decoder.decode(&job.request)))
            .unwrap_or_else(|_| {
                tracing::error!(worker, timestamp, "Decode worker panicked on batch");
                DecodeResponse::failed(timestamp, format!("decode worker {worker} panicked"))
            });

        // The requester may have been cancelled; its batch is simply dropped.
        let _ = job.reply.send(response);
    }
    tracing::debug!(worker, tracked = decoder.tracked_ids(), "Decode worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(lines: &str, batch_timestamp: i64) -> DecodeRequest {
        DecodeRequest {
            lines: lines.to_string(),
            header: Arc::new(ReferenceFrame {
                reference_longitude: 30.0,
                reference_latitude: 45.0,
                ..ReferenceFrame::default()
            }),
            batch_timestamp,
        }
    }

    #[test]
    fn decode_skips_bad_lines() {
        let mut decoder = Decoder::new(ParseMode::Strict);
        let response = decoder.decode(&request("a1,T=1|2|3\nnocomma\n#1.5\n\nb2,Name=X\n", 42));
        assert_eq!(response.frames.len(), 2);
        assert_eq!(response.skipped, 1);
        assert_eq!(response.timestamp, 42);
        assert!(response.error.is_none());
        assert_eq!(response.frames[0].dynamics.pose.longitude, 31.0);
        assert_eq!(response.frames[0].dynamics.time, 42);
    }

    #[test]
    fn routing_uses_the_sanitised_id() {
        assert_eq!(route_key("-a1\r,T=1|2|3"), EntityId::sanitize("a1"));
        for shards in 1..8 {
            let id = route_key("a1,T=1|2|3");
            assert_eq!(shard_for(&id, shards), shard_for(&route_key("-a1,"), shards));
            assert!(shard_for(&id, shards) < shards);
        }
        assert_eq!(shard_for(&EntityId::sanitize("x"), 0), 0);
    }

    #[tokio::test]
    async fn pool_keeps_state_per_worker() {
        let pool = DecodePool::spawn(2, 4, ParseMode::Strict);
        let id = EntityId::sanitize("a1");
        let worker = shard_for(&id, pool.workers());

        let first = pool.submit(worker, request("a1,T=1|2|100|5|6|7", 0)).await;
        let second = pool.submit(worker, request("a1,T=|3|", 10)).await;

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first.frames[0].dynamics.pose.altitude, 100.0);

        let pose = second.frames[0].dynamics.pose;
        assert_eq!((pose.longitude, pose.latitude, pose.altitude), (31.0, 48.0, 100.0));
        assert_eq!(pose.yaw, 7.0);
        assert_eq!(second.timestamp, 10);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_worker_is_an_errored_response() {
        let pool = DecodePool::spawn(1, 1, ParseMode::Strict);
        let response = pool.submit(9, request("a1,T=1|2|3", 7)).await.await.unwrap();
        assert!(response.frames.is_empty());
        assert_eq!(response.timestamp, 7);
        assert!(response.error.unwrap().contains('9'));
        pool.shutdown().await;
    }
}
