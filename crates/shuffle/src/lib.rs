//! # Shuffle - distributed bucket sort for one node
//!
//! Runs one node's share of the sort: it builds the mesh, routes its local
//! shard to the owning nodes, collects what the other nodes route to it,
//! then sorts and writes the owned partition.
//!
//! ## Flow
//!
//! ```text
//!  bind listener
//!       |
//!       v
//!  Mesh::establish ──────── acceptor + reader threads ──┐
//!       |                                               | InboundEvent
//!       v                                               v
//!  Partitioner::forward   (input shard -> outbound[dest])  mpsc queue
//!       |                                               |
//!       v                                               |
//!  Partitioner::finish    (EndOfStream on every link)   |
//!       |                                               |
//!       v                                               |
//!  Collector::drain  <──────────────────────────────────┘
//!       |   (returns once every node id has finished)
//!       v
//!  sort_and_write -> output file
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | [`partition`] | destination function, `Partitioner`, sentinel broadcast |
//! | [`collector`] | ingestion queue consumer, per-peer completion       |
//! | [`sort`]      | key sort and atomic output write                     |
//!
//! Every error is fatal to the run: there is no partial result and no
//! resumption. A failed run is restarted by all nodes.

pub mod collector;
pub mod partition;
pub mod sort;

use anyhow::{Context, Result};
use config::{ShuffleConfig, Topology};
use mesh::{Mesh, MeshListener};
use record::ShardReader;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{info, warn};

pub use collector::{CollectError, Collector, Progress};
pub use partition::{destination, server_bits, LinkSet, Partitioner};
pub use sort::{sort_and_write, sort_records, write_sorted};

/// Everything one node needs to take part in a run.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// This node's id (its position in the topology).
    pub self_id: usize,
    /// Local input shard: raw concatenated records.
    pub input: PathBuf,
    /// Where the sorted partition is written.
    pub output: PathBuf,
    pub topology: Topology,
    pub config: ShuffleConfig,
}

/// Counters reported at the end of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read from the local shard and forwarded.
    pub sent: u64,
    /// Forwarded records per destination node.
    pub per_destination: Vec<u64>,
    /// Records received from all nodes, i.e. the size of the owned partition.
    pub received: u64,
    /// Bytes written to the output file.
    pub bytes_written: u64,
}

/// Runs one node to completion, listening on its topology address.
pub fn run_node(opts: &NodeOptions) -> Result<RunSummary> {
    let me = opts.topology.node(opts.self_id)?;
    let listener = MeshListener::bind(&me.address())?;
    run_node_with_listener(opts, listener)
}

/// Same as [`run_node`] with a listener the caller has already bound.
pub fn run_node_with_listener(opts: &NodeOptions, listener: MeshListener) -> Result<RunSummary> {
    let topology = &opts.topology;
    topology.validate()?;
    topology.node(opts.self_id)?;

    let mut partitioner = Partitioner::new(topology.len())?;

    // Open the shard before anyone connects so a bad path fails fast.
    let mut shard = ShardReader::open(&opts.input)
        .with_context(|| format!("failed to open input {}", opts.input.display()))?;

    let (tx, rx) = mpsc::channel();
    let mut mesh = Mesh::establish(topology, opts.self_id, listener, &opts.config, tx)
        .context("failed to establish mesh")?;

    let sent = partitioner.forward(&mut shard, &mut mesh)?;
    if shard.trailing_bytes() > 0 {
        warn!(
            bytes = shard.trailing_bytes(),
            "input ends with a partial record; it was not forwarded"
        );
    }
    partitioner.finish(&mut mesh)?;

    let records = Collector::new(topology.len())
        .drain(&rx)
        .context("shuffle did not complete")?;
    mesh.join_acceptor();

    let received = records.len() as u64;
    let bytes_written = sort_and_write(&opts.output, records)
        .with_context(|| format!("failed to write output {}", opts.output.display()))?;

    let summary = RunSummary {
        sent,
        per_destination: partitioner.per_destination().to_vec(),
        received,
        bytes_written,
    };
    info!(
        self_id = opts.self_id,
        sent = summary.sent,
        received = summary.received,
        per_destination = ?summary.per_destination,
        "node finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests;
