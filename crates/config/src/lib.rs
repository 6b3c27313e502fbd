//! # Config — cluster topology and runtime tuning
//!
//! Two kinds of configuration feed a node:
//!
//! - [`Topology`]: the static list of nodes, loaded from a YAML file that
//!   every node reads identically. Node ids are positions in the list.
//! - [`ShuffleConfig`]: per-process tuning knobs read from environment
//!   variables, each with a default.
//!
//! ## Topology file
//!
//! ```yaml
//! servers:
//!   - serverId: 0
//!     host: 127.0.0.1
//!     port: "8080"
//!   - serverId: 1
//!     host: 127.0.0.1
//!     port: "8081"
//! ```
//!
//! ## Environment
//!
//! ```text
//! NETSORT_SETTLE_MS       delay between listen and first dial  (default: 2000)
//! NETSORT_DIAL_RETRIES    immediate re-dials after a failure   (default: 10)
//! NETSORT_SEND_BUFFER_KB  per-link send buffer in KiB          (default: 64)
//! ```

mod runtime;
mod topology;

pub use runtime::{
    ShuffleConfig, DEFAULT_DIAL_RETRIES, DEFAULT_SEND_BUFFER_KB, DEFAULT_SETTLE_MS,
};
pub use topology::{NodeDescriptor, Topology, TopologyError};
