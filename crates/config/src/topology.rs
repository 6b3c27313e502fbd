use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid topology yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("topology lists no servers")]
    Empty,

    /// Nodes are addressed by position, so `servers[i].serverId` must be `i`.
    #[error("server at position {position} has serverId {id}")]
    IdMismatch { position: usize, id: usize },

    /// The key-prefix partitioner only splits the keyspace evenly for 2^k nodes.
    #[error("topology has {0} servers; the node count must be a power of two")]
    NotPowerOfTwo(usize),

    #[error("server id {id} not present in topology of {len} servers")]
    UnknownNode { id: usize, len: usize },
}

/// One node of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(rename = "serverId")]
    pub id: usize,
    pub host: String,
    #[serde(deserialize_with = "port_string")]
    pub port: String,
}

impl NodeDescriptor {
    /// `host:port`, suitable for `TcpListener::bind` / `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Accepts `port: "8080"` as well as a bare YAML integer `port: 8080`.
fn port_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s,
        Port::Number(n) => n.to_string(),
    })
}

/// The ordered, immutable list of nodes taking part in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub servers: Vec<NodeDescriptor>,
}

impl Topology {
    /// Reads, parses, and validates the topology file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TopologyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let topo: Topology =
            serde_yaml::from_str(&text).map_err(|source| TopologyError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        topo.validate()?;
        Ok(topo)
    }

    /// Parses and validates a topology from an in-memory YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TopologyError> {
        let topo: Topology = serde_yaml::from_str(yaml)?;
        topo.validate()?;
        Ok(topo)
    }

    /// Builds a topology directly from descriptors (validated).
    pub fn new(servers: Vec<NodeDescriptor>) -> Result<Self, TopologyError> {
        let topo = Topology { servers };
        topo.validate()?;
        Ok(topo)
    }

    /// Checks the invariants every node relies on.
    ///
    /// - at least one server
    /// - `servers[i].id == i`
    /// - the server count is a power of two
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.servers.is_empty() {
            return Err(TopologyError::Empty);
        }
        for (position, node) in self.servers.iter().enumerate() {
            if node.id != position {
                return Err(TopologyError::IdMismatch {
                    position,
                    id: node.id,
                });
            }
        }
        if !self.servers.len().is_power_of_two() {
            return Err(TopologyError::NotPowerOfTwo(self.servers.len()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: usize) -> Result<&NodeDescriptor, TopologyError> {
        self.servers.get(id).ok_or(TopologyError::UnknownNode {
            id,
            len: self.servers.len(),
        })
    }

    /// Number of leading key bits that select the destination node: `log2(len)`.
    #[must_use]
    pub fn server_bits(&self) -> u32 {
        self.servers.len().max(1).trailing_zeros()
    }
}
