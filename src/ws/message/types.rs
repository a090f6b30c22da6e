use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hello message data
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// heartbeat period in milliseconds
    pub heartbeat_interval: u64,
}

/// Client properties sent in identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// operating system
    pub os: String,
    /// library name
    pub browser: String,
    /// library name, again
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Identify message data
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identify {
    /// authentication token
    pub token: String,
    /// connection properties
    pub properties: ConnectionProperties,
    /// request zlib compressed payloads
    #[serde(default)]
    pub compress: bool,
    /// member count above which a guild is sent without offline members
    pub large_threshold: u8,
    /// `[shard_id, shard_count]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    /// initial presence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Value>,
    /// intents bitmask
    pub intents: u64,
}

impl Debug for Identify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .field("presence", &self.presence)
            .field("intents", &self.intents)
            .finish()
    }
}

/// Resume message data
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// authentication token
    pub token: String,
    /// session to resume
    pub session_id: String,
    /// last sequence number received, null if none
    pub seq: Option<u64>,
}

impl Debug for Resume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resume")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

/// A dispatched event, the `s`, `t` and `d` fields of an op 0 frame
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// sequence number
    pub sequence: u64,
    /// event name
    pub event: String,
    /// event body, opaque to this crate
    pub data: Value,
}

impl Dispatch {
    /// event name of the dispatch which ends a fresh identify
    pub const READY: &'static str = "READY";
    /// event name of the dispatch which ends a resume
    pub const RESUMED: &'static str = "RESUMED";

    /// true if this is the READY event
    pub fn is_ready(&self) -> bool {
        self.event == Self::READY
    }

    /// true if this is the RESUMED event
    pub fn is_resumed(&self) -> bool {
        self.event == Self::RESUMED
    }
}

/// Fields of READY event body this crate cares about
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ready {
    /// new session id
    pub session_id: String,
    /// url to use when resuming this session
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}
