use config::{ShuffleConfig, Topology};
use record::{write_node_id, Frame};
use std::io::{self, BufWriter, Write};
use std::net::TcpStream;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::{InboundEvent, MeshError, MeshListener};

/// A buffered, write-only link to one peer.
pub struct OutboundLink {
    peer: usize,
    writer: BufWriter<TcpStream>,
}

impl OutboundLink {
    pub fn peer(&self) -> usize {
        self.peer
    }

    /// Writes one frame. Blocks while the peer is not draining the link.
    pub fn send(&mut self, frame: &Frame) -> Result<(), MeshError> {
        frame
            .write_to(&mut self.writer)
            .map_err(|source| MeshError::Send {
                peer: self.peer,
                source,
            })
    }

    pub fn flush(&mut self) -> Result<(), MeshError> {
        self.writer.flush().map_err(|source| MeshError::Send {
            peer: self.peer,
            source,
        })
    }
}

/// Connects to `addr`, retrying immediately up to `attempts` times in total.
///
/// On success the handshake preamble (`self_id`) is written before the link
/// is returned.
pub fn dial(
    addr: &str,
    peer: usize,
    self_id: usize,
    attempts: u32,
    buffer_bytes: usize,
) -> Result<OutboundLink, MeshError> {
    let attempts = attempts.max(1);
    let mut last_err: Option<io::Error> = None;

    for attempt in 1..=attempts {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                let send_err = |source| MeshError::Send { peer, source };
                stream.set_nodelay(true).map_err(send_err)?;
                let mut writer = BufWriter::with_capacity(buffer_bytes.max(1), stream);
                write_node_id(&mut writer, self_id).map_err(send_err)?;
                debug!(peer, %addr, attempt, "outbound link established");
                return Ok(OutboundLink { peer, writer });
            }
            Err(e) => {
                warn!(peer, %addr, attempt, "dial failed: {}", e);
                last_err = Some(e);
            }
        }
    }

    Err(MeshError::DialExhausted {
        peer,
        addr: addr.to_string(),
        attempts,
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no dial attempted")),
    })
}

/// The full set of outbound links for one node, indexed by peer id.
pub struct Mesh {
    outbound: Vec<OutboundLink>,
    acceptor: Option<JoinHandle<()>>,
}

impl Mesh {
    /// Builds the mesh for node `self_id`.
    ///
    /// 1. Start accepting `topology.len()` inbound links on `listener`;
    ///    their frames go to `sink`.
    /// 2. Wait `config.settle_delay` for the rest of the fleet to listen.
    /// 3. Dial every node in ascending id order, self included.
    ///
    /// Any dial that exhausts its retries aborts the whole mesh.
    pub fn establish(
        topology: &Topology,
        self_id: usize,
        listener: MeshListener,
        config: &ShuffleConfig,
        sink: Sender<InboundEvent>,
    ) -> Result<Self, MeshError> {
        let acceptor = listener.spawn_acceptor(topology.len(), sink)?;

        if !config.settle_delay.is_zero() {
            debug!(delay_ms = config.settle_delay.as_millis() as u64, "waiting for peers to listen");
            thread::sleep(config.settle_delay);
        }

        let mut outbound = Vec::with_capacity(topology.len());
        for node in &topology.servers {
            let link = dial(
                &node.address(),
                node.id,
                self_id,
                config.dial_attempts(),
                config.send_buffer_bytes,
            )?;
            outbound.push(link);
        }

        info!(self_id, links = outbound.len(), "mesh established");
        Ok(Self {
            outbound,
            acceptor: Some(acceptor),
        })
    }

    /// Number of outbound links (equals the topology size).
    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Sends `frame` on the link to `peer`.
    pub fn send(&mut self, peer: usize, frame: &Frame) -> Result<(), MeshError> {
        let len = self.outbound.len();
        self.outbound
            .get_mut(peer)
            .ok_or(MeshError::NoLink { peer, len })?
            .send(frame)
    }

    /// Flushes any buffered frames on the link to `peer`.
    pub fn flush(&mut self, peer: usize) -> Result<(), MeshError> {
        let len = self.outbound.len();
        self.outbound
            .get_mut(peer)
            .ok_or(MeshError::NoLink { peer, len })?
            .flush()
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut OutboundLink> {
        self.outbound.iter_mut()
    }

    /// Waits for the acceptor thread, which exits once every inbound link
    /// has been accepted.
    pub fn join_acceptor(&mut self) {
        if let Some(handle) = self.acceptor.take() {
            if handle.join().is_err() {
                warn!("acceptor thread panicked");
            }
        }
    }
}
