//! # netsort - one node of a distributed bucket sort
//!
//! Every node of the cluster runs this binary with its own id, input shard,
//! and output path, and the same topology file. The nodes connect to each
//! other, exchange records by key prefix, and each writes its owned key
//! range sorted.
//!
//! ## Usage
//!
//! ```text
//! netsort <serverId> <inputPath> <outputPath> <configPath>
//! ```
//!
//! ## Configuration
//!
//! ```text
//! RUST_LOG                log filter              (default: "info")
//! NETSORT_SETTLE_MS       delay before dialing    (default: 2000)
//! NETSORT_DIAL_RETRIES    immediate re-dials      (default: 10)
//! NETSORT_SEND_BUFFER_KB  per-link send buffer    (default: 64)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ netsort 0 data/input-0.dat data/output-0.dat servers.yaml &
//! $ netsort 1 data/input-1.dat data/output-1.dat servers.yaml
//! ```
//!
//! Any error is fatal: it is printed and the process exits non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use config::{ShuffleConfig, Topology};
use shuffle::NodeOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netsort")]
#[command(about = "Distributed bucket sort: shuffle records by key prefix, then sort locally")]
struct Args {
    /// This node's id (its position in the topology file)
    server_id: usize,

    /// Local input shard (raw 100-byte records)
    input_path: PathBuf,

    /// Where this node's sorted partition is written
    output_path: PathBuf,

    /// YAML topology listing every server
    config_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(server_id = args.server_id, "starting");

    let topology = Topology::load(&args.config_path)?;
    tracing::info!(servers = topology.len(), "loaded topology: {:?}", topology.servers);

    let opts = NodeOptions {
        self_id: args.server_id,
        input: args.input_path,
        output: args.output_path,
        topology,
        config: ShuffleConfig::from_env(),
    };

    let summary = shuffle::run_node(&opts)
        .with_context(|| format!("node {} failed", opts.self_id))?;

    tracing::info!(
        sent = summary.sent,
        received = summary.received,
        bytes = summary.bytes_written,
        "done"
    );
    Ok(())
}
