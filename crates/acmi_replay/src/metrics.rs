use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use ingest::ChunkReport;
use mesh_catalog::CacheStats;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus collectors for one replay process.
pub struct ReplayMetrics {
    pub registry: Registry,
    /// Non-empty stream lines handed to the decoder after the header.
    pub lines_decoded_total: IntCounter,
    /// Record lines and timestamp markers that failed to decode.
    pub decode_failures_total: IntCounter,
    pub chunks_applied_total: IntCounter,
    /// Decode batches that came back with an error.
    pub batch_errors_total: IntCounter,
    pub entities_inserted_total: IntCounter,
    pub entities_tracked: IntGauge,
    /// Coalesced entity table notifications observed.
    pub table_notifications_total: IntCounter,
    pub mesh_cache_hits: IntGauge,
    pub mesh_cache_misses: IntGauge,
}

impl ReplayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("acmi_replay".into()), None)?;

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry.register(Box::new(collector.clone()))?;
                collector
            }};
        }

        Ok(Self {
            lines_decoded_total: reg!(IntCounter::new(
                "lines_decoded_total",
                "Stream lines handed to the decoder"
            )?),
            decode_failures_total: reg!(IntCounter::new(
                "decode_failures_total",
                "Lines skipped because they could not be decoded"
            )?),
            chunks_applied_total: reg!(IntCounter::new(
                "chunks_applied_total",
                "Chunks committed to the entity table"
            )?),
            batch_errors_total: reg!(IntCounter::new(
                "batch_errors_total",
                "Decode batches that failed as a whole"
            )?),
            entities_inserted_total: reg!(IntCounter::new(
                "entities_inserted_total",
                "Entities seen for the first time"
            )?),
            entities_tracked: reg!(IntGauge::new(
                "entities_tracked",
                "Entities currently in the table"
            )?),
            table_notifications_total: reg!(IntCounter::new(
                "table_notifications_total",
                "Coalesced entity table change notifications"
            )?),
            mesh_cache_hits: reg!(IntGauge::new(
                "mesh_cache_hits",
                "Mesh lookups answered from the cache"
            )?),
            mesh_cache_misses: reg!(IntGauge::new(
                "mesh_cache_misses",
                "Mesh lookups that ran the matcher"
            )?),
            registry,
        })
    }

    pub fn record_chunk(&self, report: &ChunkReport) {
        self.lines_decoded_total.inc_by(report.lines as u64);
        self.decode_failures_total.inc_by(report.skipped as u64);
        self.batch_errors_total.inc_by(report.errors.len() as u64);
        self.entities_inserted_total.inc_by(report.inserted as u64);
        self.chunks_applied_total.inc();
    }

    pub fn update_mesh_cache(&self, stats: &CacheStats) {
        self.mesh_cache_hits.set(stats.hits as i64);
        self.mesh_cache_misses.set(stats.misses as i64);
    }

    /// Text exposition of every registered collector.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Router serving the registry on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    let mut buffer = Vec::new();
                    match TextEncoder::new().encode(&registry.gather(), &mut buffer) {
                        Ok(()) => String::from_utf8_lossy(&buffer).into_owned().into_response(),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
                        }
                    }
                }
            }),
        )
    }
}
