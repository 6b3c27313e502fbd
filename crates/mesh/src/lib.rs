//! # Mesh — all-to-all links between the nodes of a topology
//!
//! Every node listens on its own address and dials every node in the
//! topology, itself included, so each node ends up with exactly `N`
//! outbound links and accepts exactly `N` inbound ones.
//!
//! ```text
//!            dial (ascending id)                 accept (any order)
//!  node s ──────────────────────► node j    node j ──────────────────► node s
//!    outbound[j]: frames for j               reader thread per link
//!                                                   │
//!                                                   v
//!                                        mpsc::Sender<InboundEvent>
//! ```
//!
//! ## Handshake
//!
//! The dialer's first four bytes on a link are its own node id
//! (`u32` LE). The accepting side uses it to tag every event coming off
//! that link, so the collector can track completion per peer.
//!
//! ## Threads
//!
//! - one acceptor thread, which exits after `N` accepts
//! - one reader thread per inbound link, which exits after the sentinel
//!   (or the first error)
//!
//! Outbound links are owned and written by the caller's thread only.

mod link;
mod listener;

use record::{FrameError, Record};
use std::io;
use thiserror::Error;

pub use link::{dial, Mesh, OutboundLink};
pub use listener::MeshListener;

/// Errors raised while building or using the mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept inbound link: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to start {what} thread: {source}")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("could not reach node {peer} at {addr} after {attempts} attempts: {source}")]
    DialExhausted {
        peer: usize,
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("inbound handshake failed: {0}")]
    Handshake(#[source] FrameError),

    #[error("inbound link announced node {id}, topology has {len} nodes")]
    UnknownPeer { id: usize, len: usize },

    #[error("link from node {peer} failed: {source}")]
    Link {
        peer: usize,
        #[source]
        source: FrameError,
    },

    #[error("link from node {peer} closed before its end-of-stream frame")]
    ClosedBeforeSentinel { peer: usize },

    #[error("failed to send to node {peer}: {source}")]
    Send {
        peer: usize,
        #[source]
        source: io::Error,
    },

    #[error("no outbound link to node {peer} (mesh has {len})")]
    NoLink { peer: usize, len: usize },
}

/// What a reader thread reports about its inbound link.
#[derive(Debug)]
pub enum InboundEvent {
    /// A data frame arrived from `peer`.
    Record { peer: usize, record: Record },
    /// `peer` sent its end-of-stream sentinel on this link.
    Finished { peer: usize },
    /// The link (or the acceptor) failed; the shuffle cannot complete.
    Failed { error: MeshError },
}
