use std::time::Duration;

/// Default pause between starting the listener and dialing peers.
pub const DEFAULT_SETTLE_MS: u64 = 2000;

/// Default number of immediate re-dials after a failed connection attempt.
pub const DEFAULT_DIAL_RETRIES: u32 = 10;

/// Default per-link send buffer (KiB).
pub const DEFAULT_SEND_BUFFER_KB: usize = 64;

/// Runtime tuning for one node's shuffle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleConfig {
    /// Gives slower peers time to start listening before anyone dials.
    pub settle_delay: Duration,
    /// Extra dial attempts after the first one fails. Exhaustion is fatal.
    pub dial_retries: u32,
    /// Capacity of the buffered writer in front of each outbound link.
    pub send_buffer_bytes: usize,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            dial_retries: DEFAULT_DIAL_RETRIES,
            send_buffer_bytes: DEFAULT_SEND_BUFFER_KB * 1024,
        }
    }
}

impl ShuffleConfig {
    /// Reads `NETSORT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a pluggable source, so tests
    /// do not have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let settle_ms: u64 = lookup("NETSORT_SETTLE_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SETTLE_MS);
        let dial_retries: u32 = lookup("NETSORT_DIAL_RETRIES")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_DIAL_RETRIES);
        let send_kb: usize = lookup("NETSORT_SEND_BUFFER_KB")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&kb| kb > 0)
            .unwrap_or(DEFAULT_SEND_BUFFER_KB);

        Self {
            settle_delay: Duration::from_millis(settle_ms),
            dial_retries,
            send_buffer_bytes: send_kb * 1024,
        }
    }

    /// Total connection attempts per peer: the first dial plus the retries.
    #[must_use]
    pub fn dial_attempts(&self) -> u32 {
        self.dial_retries.saturating_add(1)
    }
}
