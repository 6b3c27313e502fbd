use anyhow::Result;
use config::{NodeDescriptor, ShuffleConfig, Topology};
use mesh::MeshError;
use record::{Frame, Record, RECORD_SIZE};
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use crate::LinkSet;

/// A record whose key starts with `first`, every other byte set to `fill`.
pub fn make_record(first: u8, fill: u8) -> Record {
    let mut bytes = [fill; RECORD_SIZE];
    bytes[0] = first;
    Record::new(bytes)
}

/// Deterministic pseudo-random records (xorshift), so runs are reproducible.
pub fn pseudo_random_records(count: usize, seed: u64) -> Vec<Record> {
    let mut state = seed.max(1);
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; RECORD_SIZE];
            for b in bytes.iter_mut() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                *b = (state >> 24) as u8;
            }
            Record::new(bytes)
        })
        .collect()
}

pub fn write_shard(path: &Path, records: &[Record]) -> Result<()> {
    let mut data = Vec::with_capacity(records.len() * RECORD_SIZE);
    for r in records {
        data.extend_from_slice(r.as_bytes());
    }
    fs::write(path, data)?;
    Ok(())
}

pub fn read_output(path: &Path) -> Result<Vec<Record>> {
    let data = fs::read(path)?;
    assert_eq!(data.len() % RECORD_SIZE, 0, "output is not whole records");
    data.chunks(RECORD_SIZE)
        .map(|c| Record::from_slice(c).map_err(anyhow::Error::from))
        .collect()
}

pub fn quick_config() -> ShuffleConfig {
    ShuffleConfig {
        settle_delay: Duration::from_millis(0),
        dial_retries: 5,
        send_buffer_bytes: 16 * 1024,
    }
}

/// Binds `n` loopback listeners on ephemeral ports and the matching topology.
pub fn local_topology(n: usize) -> Result<(Topology, Vec<TcpListener>)> {
    let mut listeners = Vec::new();
    let mut servers = Vec::new();
    for id in 0..n {
        let l = TcpListener::bind("127.0.0.1:0")?;
        servers.push(NodeDescriptor {
            id,
            host: "127.0.0.1".to_string(),
            port: l.local_addr()?.port().to_string(),
        });
        listeners.push(l);
    }
    Ok((Topology::new(servers)?, listeners))
}

/// In-memory stand-in for the mesh: one frame list per link.
pub struct VecLinks {
    pub frames: Vec<Vec<Frame>>,
    pub flushes: Vec<usize>,
}

impl VecLinks {
    pub fn new(n: usize) -> Self {
        Self {
            frames: vec![Vec::new(); n],
            flushes: vec![0; n],
        }
    }
}

impl LinkSet for VecLinks {
    fn link_count(&self) -> usize {
        self.frames.len()
    }

    fn send(&mut self, peer: usize, frame: &Frame) -> Result<(), MeshError> {
        self.frames[peer].push(frame.clone());
        Ok(())
    }

    fn flush(&mut self, peer: usize) -> Result<(), MeshError> {
        self.flushes[peer] += 1;
        Ok(())
    }
}
