//! Key-prefix partitioning of the local shard across outbound links.
//!
//! With `N = 2^b` nodes, a record belongs to the node whose id equals the
//! top `b` bits of its first key byte. Records owned by this node still
//! travel over the self-link, so every link carries exactly one sentinel.

use anyhow::{bail, Context, Result};
use mesh::{Mesh, MeshError};
use record::{Frame, Record, ShardReader};
use std::io::Read;
use tracing::{debug, trace};

/// Largest `b` the single-byte prefix can express (256 nodes).
pub const MAX_SERVER_BITS: u32 = 8;

/// `log2(nodes)` for a power-of-two node count.
#[must_use]
pub fn server_bits(nodes: usize) -> u32 {
    nodes.max(1).trailing_zeros()
}

/// Destination node for `key`: the top `bits` bits of `key[0]`.
///
/// `bits == 0` (a single node) routes everything to node 0.
#[must_use]
pub fn destination(key: &[u8], bits: u32) -> usize {
    if bits == 0 {
        return 0;
    }
    let first = key.first().copied().unwrap_or(0);
    (first >> (8 - bits)) as usize
}

/// The outbound side of the mesh as seen by the partitioner.
pub trait LinkSet {
    fn link_count(&self) -> usize;
    fn send(&mut self, peer: usize, frame: &Frame) -> Result<(), MeshError>;
    fn flush(&mut self, peer: usize) -> Result<(), MeshError>;
}

impl LinkSet for Mesh {
    fn link_count(&self) -> usize {
        self.len()
    }

    fn send(&mut self, peer: usize, frame: &Frame) -> Result<(), MeshError> {
        Mesh::send(self, peer, frame)
    }

    fn flush(&mut self, peer: usize) -> Result<(), MeshError> {
        Mesh::flush(self, peer)
    }
}

/// Routes every local record to its owning node.
#[derive(Debug)]
pub struct Partitioner {
    bits: u32,
    per_destination: Vec<u64>,
}

impl Partitioner {
    /// Creates a partitioner for a topology of `nodes` servers.
    ///
    /// # Errors
    ///
    /// `nodes` must be a power of two no larger than 256.
    pub fn new(nodes: usize) -> Result<Self> {
        if nodes == 0 || !nodes.is_power_of_two() {
            bail!("node count {} is not a power of two", nodes);
        }
        let bits = server_bits(nodes);
        if bits > MAX_SERVER_BITS {
            bail!(
                "node count {} needs {} prefix bits; at most {} are supported",
                nodes,
                bits,
                MAX_SERVER_BITS
            );
        }
        Ok(Self {
            bits,
            per_destination: vec![0; nodes],
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Destination node of `rec`.
    #[must_use]
    pub fn route(&self, rec: &Record) -> usize {
        destination(rec.key(), self.bits)
    }

    /// Sends every record of `shard` as a data frame on its destination link.
    ///
    /// Returns the number of records forwarded.
    pub fn forward<R, L>(&mut self, shard: &mut ShardReader<R>, links: &mut L) -> Result<u64>
    where
        R: Read,
        L: LinkSet,
    {
        let mut sent = 0u64;
        while let Some(rec) = shard.next_record().context("failed to read input shard")? {
            let dest = self.route(&rec);
            trace!(dest, "forwarding {:?}", rec);
            links.send(dest, &Frame::Data(rec))?;
            self.per_destination[dest] += 1;
            sent += 1;
        }
        debug!(sent, "local shard forwarded");
        Ok(sent)
    }

    /// Sends one end-of-stream sentinel on every link and flushes it.
    pub fn finish<L: LinkSet>(&self, links: &mut L) -> Result<()> {
        for peer in 0..links.link_count() {
            links.send(peer, &Frame::EndOfStream)?;
            links.flush(peer)?;
        }
        debug!(links = links.link_count(), "end-of-stream sent on every link");
        Ok(())
    }

    /// Records sent to each node so far, indexed by node id.
    pub fn per_destination(&self) -> &[u64] {
        &self.per_destination
    }
}
