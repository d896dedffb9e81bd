use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// `acmi_replay` - Replays a recorded ACMI telemetry stream.
///
/// The stream is fed through the ingestion pipeline in chunks of complete
/// lines, exactly as a live transport would deliver it, and the resulting
/// entity table can be dumped as JSON.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Recorded stream to replay. Reads stdin when omitted or `-`.
    #[arg(long, env = "ACMI_INPUT")]
    pub input: Option<PathBuf>,

    /// JSON mesh catalog used to resolve entity model paths.
    ///
    /// Without a catalog every entity gets an empty model path.
    #[arg(long, env = "MESH_CATALOG_PATH")]
    pub mesh_catalog: Option<PathBuf>,

    /// Decode worker tasks. `0` decodes on the ingestion task.
    #[arg(long, env = "DECODE_WORKERS", default_value_t = 4)]
    pub decode_workers: usize,

    /// Lines handed to the pipeline per chunk.
    #[arg(long, env = "CHUNK_LINES", default_value_t = 512, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_lines: u64,

    /// Mesh file extension found in the catalog.
    #[arg(long, default_value = "obj")]
    pub mesh_from_ext: String,

    /// Extension the renderer loads instead.
    #[arg(long, default_value = "glb")]
    pub mesh_to_ext: String,

    /// Drop unknown record keys instead of keeping them as entity attributes.
    #[arg(long)]
    pub strict: bool,

    /// Listen address for the Prometheus `/metrics` endpoint.
    #[arg(long, env = "METRICS_LISTEN_ADDR")]
    pub metrics_listen_addr: Option<SocketAddr>,

    /// Keep serving metrics after the replay until a shutdown signal.
    #[arg(long, requires = "metrics_listen_addr")]
    pub serve: bool,

    /// Write the final entity table to this file as JSON.
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// `None` means stdin.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|path| path.as_os_str() != "-")
    }
}
