//! Aggregation of inbound frames and detection of shuffle completion.
//!
//! The collector is the single consumer of the ingestion queue. It owns the
//! per-peer "sentinel seen" flags outright; no other thread touches them.
//! Completion means one sentinel from every node id in the topology, in
//! whatever order the links deliver them.

use mesh::{InboundEvent, MeshError};
use record::Record;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::{debug, info};

/// Protocol violations and link failures seen while collecting.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("node {peer} sent a second end-of-stream frame")]
    DuplicateSentinel { peer: usize },

    #[error("node {peer} sent a record after its end-of-stream frame")]
    RecordAfterSentinel { peer: usize },

    #[error("event from node {peer}, topology has {len} nodes")]
    UnknownPeer { peer: usize, len: usize },

    #[error(transparent)]
    Link(#[from] MeshError),

    #[error("all inbound links closed with {remaining} node(s) still unfinished")]
    Disconnected { remaining: usize },
}

/// Whether the shuffle has received everything it ever will.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Complete,
}

/// Per-node shuffle state: sentinel flags plus every record received so far.
#[derive(Debug)]
pub struct ShuffleState {
    finished: Vec<bool>,
    remaining: usize,
    records: Vec<Record>,
}

impl ShuffleState {
    fn new(nodes: usize) -> Self {
        Self {
            finished: vec![false; nodes],
            remaining: nodes,
            records: Vec::new(),
        }
    }

    fn check_peer(&self, peer: usize) -> Result<(), CollectError> {
        if peer >= self.finished.len() {
            return Err(CollectError::UnknownPeer {
                peer,
                len: self.finished.len(),
            });
        }
        Ok(())
    }
}

/// Drains the ingestion queue until every peer has finished.
#[derive(Debug)]
pub struct Collector {
    state: ShuffleState,
}

impl Collector {
    pub fn new(nodes: usize) -> Self {
        Self {
            state: ShuffleState::new(nodes),
        }
    }

    /// Applies one inbound event to the state.
    pub fn apply(&mut self, event: InboundEvent) -> Result<Progress, CollectError> {
        match event {
            InboundEvent::Record { peer, record } => {
                self.state.check_peer(peer)?;
                if self.state.finished[peer] {
                    return Err(CollectError::RecordAfterSentinel { peer });
                }
                self.state.records.push(record);
            }
            InboundEvent::Finished { peer } => {
                self.state.check_peer(peer)?;
                if self.state.finished[peer] {
                    return Err(CollectError::DuplicateSentinel { peer });
                }
                self.state.finished[peer] = true;
                self.state.remaining -= 1;
                debug!(
                    peer,
                    remaining = self.state.remaining,
                    "node finished sending"
                );
            }
            InboundEvent::Failed { error } => return Err(CollectError::Link(error)),
        }
        Ok(self.progress())
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        if self.state.remaining == 0 {
            Progress::Complete
        } else {
            Progress::Pending
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress() == Progress::Complete
    }

    /// Number of records collected so far.
    pub fn received(&self) -> usize {
        self.state.records.len()
    }

    /// Node ids whose sentinel has not arrived yet.
    pub fn pending_peers(&self) -> Vec<usize> {
        self.state
            .finished
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(id, _)| id)
            .collect()
    }

    /// Blocks on `rx` until every node has finished, then returns the
    /// collected records in arrival order.
    ///
    /// There is no timeout: a peer that never sends its sentinel stalls
    /// this call for as long as its link stays open.
    pub fn drain(mut self, rx: &Receiver<InboundEvent>) -> Result<Vec<Record>, CollectError> {
        while !self.is_complete() {
            let event = rx.recv().map_err(|_| CollectError::Disconnected {
                remaining: self.state.remaining,
            })?;
            self.apply(event)?;
        }
        info!(records = self.received(), "shuffle input complete");
        Ok(self.into_records())
    }

    /// Consumes the collector, returning the records collected so far.
    pub fn into_records(self) -> Vec<Record> {
        self.state.records
    }
}
