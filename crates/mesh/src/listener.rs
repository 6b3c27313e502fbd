use record::{read_node_id, Frame};
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace};

use crate::{InboundEvent, MeshError};

/// The listening half of the mesh.
///
/// Binding happens eagerly in [`bind`](MeshListener::bind), so the socket is
/// accepting connections before this node starts its own settle delay.
pub struct MeshListener {
    listener: TcpListener,
}

impl MeshListener {
    /// Binds `addr` (`host:port`).
    pub fn bind(addr: &str) -> Result<Self, MeshError> {
        let listener = TcpListener::bind(addr).map_err(|source| MeshError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(%addr, "listening for peer links");
        Ok(Self { listener })
    }

    /// Wraps a listener the caller already bound.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts the acceptor thread.
    ///
    /// It accepts exactly `expected` connections, spawning one reader thread
    /// per connection, then exits. Every event is pushed onto `sink`.
    pub fn spawn_acceptor(
        self,
        expected: usize,
        sink: Sender<InboundEvent>,
    ) -> Result<JoinHandle<()>, MeshError> {
        thread::Builder::new()
            .name("netsort-accept".to_string())
            .spawn(move || self.accept_loop(expected, sink))
            .map_err(|source| MeshError::Spawn {
                what: "acceptor".to_string(),
                source,
            })
    }

    fn accept_loop(self, expected: usize, sink: Sender<InboundEvent>) {
        for n in 0..expected {
            let (stream, from) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) => {
                    error!("accept failed after {} of {} links: {}", n, expected, e);
                    let _ = sink.send(InboundEvent::Failed {
                        error: MeshError::Accept(e),
                    });
                    return;
                }
            };
            debug!(%from, "accepted inbound link {}/{}", n + 1, expected);

            let link_sink = sink.clone();
            let spawned = thread::Builder::new()
                .name(format!("netsort-link-{}", n))
                .spawn(move || read_link(stream, expected, link_sink));
            if let Err(source) = spawned {
                let _ = sink.send(InboundEvent::Failed {
                    error: MeshError::Spawn {
                        what: "link reader".to_string(),
                        source,
                    },
                });
                return;
            }
        }
        debug!("all {} inbound links accepted", expected);
    }
}

/// Reads one inbound link until its sentinel, forwarding every frame to `sink`.
///
/// The link's peer is identified by the handshake preamble and must be a
/// valid id in a topology of `nodes` servers. A link that closes before its
/// sentinel is reported as failed.
pub(crate) fn read_link(stream: TcpStream, nodes: usize, sink: Sender<InboundEvent>) {
    let mut rdr = BufReader::new(stream);

    let peer = match read_node_id(&mut rdr) {
        Ok(id) if id < nodes => id,
        Ok(id) => {
            error!("inbound link announced unknown node {}", id);
            let _ = sink.send(InboundEvent::Failed {
                error: MeshError::UnknownPeer { id, len: nodes },
            });
            return;
        }
        Err(e) => {
            error!("inbound handshake failed: {}", e);
            let _ = sink.send(InboundEvent::Failed {
                error: MeshError::Handshake(e),
            });
            return;
        }
    };
    debug!(peer, "inbound link identified");

    let mut frames: u64 = 0;
    loop {
        let event = match Frame::read_from(&mut rdr) {
            Ok(Some(Frame::Data(record))) => {
                frames += 1;
                InboundEvent::Record { peer, record }
            }
            Ok(Some(Frame::EndOfStream)) => {
                trace!(peer, frames, "end of stream");
                let _ = sink.send(InboundEvent::Finished { peer });
                return;
            }
            Ok(None) => InboundEvent::Failed {
                error: MeshError::ClosedBeforeSentinel { peer },
            },
            Err(source) => InboundEvent::Failed {
                error: MeshError::Link { peer, source },
            },
        };

        let failed = matches!(event, InboundEvent::Failed { .. });
        if failed {
            error!(peer, frames, "inbound link failed");
        }
        // A closed queue means the collector has already stopped.
        if sink.send(event).is_err() || failed {
            return;
        }
    }
}
