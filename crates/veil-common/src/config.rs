//! Channel configuration.
//!
//! Both peers must agree on the group and the framing; nothing is
//! negotiated on the wire. Values come from defaults, optionally overridden
//! by environment variables:
//!
//! | Variable                    | Default         |
//! |-----------------------------|-----------------|
//! | `VEIL_GROUP`                | `modp14`        |
//! | `VEIL_FRAMING`              | `nul-delimited` |
//! | `VEIL_MAX_FRAME`            | `1048576`       |
//! | `VEIL_HANDSHAKE_TIMEOUT_MS` | `10000`         |
//!
//! `VEIL_FRAMING` accepts `nul`, `length` or `json`. `json` sends bare JSON
//! objects, which is what peers with no framing of their own expect.

use std::time::Duration;

use veil_core::{Framing, DEFAULT_MAX_FRAME_LEN};
use veil_crypto::GroupParams;

use crate::error::{Error, Result};

pub const ENV_GROUP: &str = "VEIL_GROUP";
pub const ENV_FRAMING: &str = "VEIL_FRAMING";
pub const ENV_MAX_FRAME: &str = "VEIL_MAX_FRAME";
pub const ENV_HANDSHAKE_TIMEOUT_MS: &str = "VEIL_HANDSHAKE_TIMEOUT_MS";

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every session on a peer.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// DH group. Must match the peer's.
    pub group: GroupParams,
    /// Stream framing. Must match the peer's.
    pub framing: Framing,
    /// Largest frame accepted from or sent to the peer.
    pub max_frame_len: usize,
    /// Upper bound on the handshake exchange; `None` waits forever.
    pub handshake_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            group: GroupParams::modp14(),
            framing: Framing::NulDelimited,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

impl ChannelConfig {
    /// Defaults overridden by `VEIL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(group) = lookup(ENV_GROUP) {
            config.group = group
                .parse()
                .map_err(|e| Error::config(format!("{ENV_GROUP}: {e}")))?;
        }

        if let Some(framing) = lookup(ENV_FRAMING) {
            config.framing = framing
                .parse()
                .map_err(|e| Error::config(format!("{ENV_FRAMING}: {e}")))?;
        }

        if let Some(max) = lookup(ENV_MAX_FRAME) {
            config.max_frame_len = parse_number(ENV_MAX_FRAME, &max)?;
            if config.max_frame_len == 0 {
                return Err(Error::config(format!("{ENV_MAX_FRAME} must be positive")));
            }
        }

        if let Some(ms) = lookup(ENV_HANDSHAKE_TIMEOUT_MS) {
            config.handshake_timeout = match parse_number(ENV_HANDSHAKE_TIMEOUT_MS, &ms)? {
                0 => None,
                ms => Some(Duration::from_millis(ms as u64)),
            };
        }

        Ok(config)
    }

    pub fn with_group(mut self, group: GroupParams) -> Self {
        self.group = group;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("{name}: {e}")))
}
