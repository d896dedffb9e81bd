mod config;
mod metrics;
mod source;

use crate::config::Config;
use crate::metrics::ReplayMetrics;
use crate::source::ChunkReader;
use acmi::{ParseMode, ReferenceFrame};
use anyhow::Context;
use clap::Parser;
use ingest::{EntityRecord, EntityTable, IngestError, IngestionPipeline, PipelineConfig};
use mesh_catalog::{CachedMeshFinder, MeshLibrary, MeshResolver, ShapeRewrite};
use serde::Serialize;
use std::{path::Path, sync::Arc};
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

/// Final table written by `--dump`.
#[derive(Serialize)]
struct TableDump<'a> {
    session: String,
    generated_at: chrono::DateTime<chrono::Utc>,
    header: Option<&'a ReferenceFrame>,
    version: u64,
    entities: Vec<EntityRecord>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let logs = fmt().with_env_filter(EnvFilter::from_default_env());
    if config.log_json {
        logs.json().init();
    } else {
        logs.init();
    }
    tracing::info!(config = ?config, "Loaded configuration");

    let metrics = Arc::new(ReplayMetrics::new().context("Failed to register metrics")?);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Spawn the metrics server
    let metrics_handle = config.metrics_listen_addr.map(|addr| {
        let router = metrics.router();
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind metrics listener on {addr}"))?;
            tracing::info!(addr = %addr, "Metrics server started");
            axum::serve(listener, router.into_make_service()).await?;
            Ok::<(), anyhow::Error>(())
        })
    });

    let shutdown_tx = Arc::new(shutdown_tx);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        });
    }

    let finder = match &config.mesh_catalog {
        Some(path) => {
            let library = MeshLibrary::from_path(path)
                .with_context(|| format!("Failed to load mesh catalog '{}'", path.display()))?;
            tracing::info!(entries = library.len(), path = %path.display(), "Loaded mesh catalog");
            Some(Arc::new(CachedMeshFinder::new(Arc::new(library))))
        }
        None => None,
    };

    let table = Arc::new(EntityTable::new());
    let observer_handle = spawn_table_observer(table.clone(), metrics.clone(), shutdown_rx.clone());

    let pipeline_config = PipelineConfig {
        decode_workers: config.decode_workers,
        parse_mode: if config.strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        },
        shape_rewrite: ShapeRewrite {
            from_extension: config.mesh_from_ext.clone(),
            to_extension: config.mesh_to_ext.clone(),
        },
        ..PipelineConfig::default()
    };
    let meshes = finder.clone().map(|finder| finder as Arc<dyn MeshResolver>);
    let mut pipeline = IngestionPipeline::new(pipeline_config, table.clone(), meshes)
        .with_shutdown(shutdown_rx.clone());
    let session = pipeline.session_id().to_string();

    let reader = source::open(config.input_path().map(|path| path.as_path())).await?;
    let mut chunks = ChunkReader::new(reader, config.chunk_lines as usize);
    let mut shutdown = shutdown_rx.clone();
    let mut interrupted = false;

    loop {
        let chunk = tokio::select! {
            chunk = chunks.next_chunk() => chunk.context("Failed to read stream")?,
            _ = shutdown.changed() => {
                interrupted = true;
                break;
            }
        };
        let Some(chunk) = chunk else {
            break;
        };

        match pipeline.ingest_chunk(&chunk).await {
            Ok(report) => {
                metrics.record_chunk(&report);
                for error in &report.errors {
                    tracing::error!(session = %session, error = %error, "Decode batch failed");
                }
                tracing::debug!(
                    session = %session,
                    lines = report.lines,
                    inserted = report.inserted,
                    updated = report.updated,
                    skipped = report.skipped,
                    "Chunk ingested"
                );
            }
            Err(e @ (IngestError::Cancelled | IngestError::Closed)) => {
                tracing::warn!(session = %session, error = %e, "Replay interrupted");
                interrupted = true;
                break;
            }
        }
    }

    let header = pipeline.header().cloned();
    let stats = pipeline.finish().await;
    if let Some(finder) = &finder {
        let cache = finder.stats();
        metrics.update_mesh_cache(&cache);
        tracing::info!(size = cache.size, hits = cache.hits, misses = cache.misses, "Mesh cache");
    }
    metrics.entities_tracked.set(table.len() as i64);

    tracing::info!(
        session = %session,
        scenario = header.as_ref().and_then(|h| h.scenario_name()).unwrap_or_default(),
        chunks = stats.chunks,
        frames = stats.frames,
        skipped = stats.skipped,
        batch_errors = stats.batch_errors,
        entities = table.len(),
        version = table.version(),
        "Replay finished"
    );

    if let Some(path) = &config.dump {
        write_dump(path, &session, header.as_ref(), &table)?;
        tracing::info!(path = %path.display(), "Wrote entity table");
    }

    if config.serve && !interrupted {
        tracing::info!("Serving metrics until shutdown...");
        let _ = shutdown.changed().await;
    }

    // Stop the observer; the table is final.
    shutdown_tx.send_replace(());

    if let Err(e) = observer_handle.await {
        tracing::error!(error = %e, "Table observer task failed.");
    }
    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    Ok(())
}

/// Mirror table versions into metrics until shutdown.
fn spawn_table_observer(
    table: Arc<EntityTable>,
    metrics: Arc<ReplayMetrics>,
    mut shutdown_rx: watch::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let mut versions = table.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = versions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let version = *versions.borrow_and_update();
                    metrics.table_notifications_total.inc();
                    metrics.entities_tracked.set(table.len() as i64);
                    tracing::trace!(version, entities = table.len(), "Entity table changed");
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    })
}

fn write_dump(
    path: &Path,
    session: &str,
    header: Option<&ReferenceFrame>,
    table: &EntityTable,
) -> anyhow::Result<()> {
    let mut entities = table.snapshot();
    entities.sort_by(|a, b| a.id.cmp(&b.id));

    let dump = TableDump {
        session: session.to_owned(),
        generated_at: chrono::Utc::now(),
        header,
        version: table.version(),
        entities,
    };

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create dump file '{}'", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &dump)
        .context("Failed to write entity table dump")?;
    Ok(())
}

/// Listens for OS shutdown signals (SIGINT, SIGTERM) and resolves when one is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
