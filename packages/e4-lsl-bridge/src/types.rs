// Common types for the bridge: error taxonomy, session state and statistics

use crate::channels::ChannelKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while talking to the streaming server or publishing
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Decode error in line '{line}': {reason}")]
    Decode { line: String, reason: String },

    #[error("Command '{command}' rejected: {reason}")]
    Rejected { command: String, reason: String },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether a streaming session hitting this error should be re-established
    pub fn triggers_reconnect(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_)
                | BridgeError::ConnectionClosed
                | BridgeError::DeviceLost(_)
                | BridgeError::Io(_)
        )
    }
}

/// Lifecycle state of the supervised session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum SessionState {
    /// No transport is open
    Disconnected,

    /// Transport open, command sequence in progress
    Handshaking,

    /// Subscribed and republishing samples
    Streaming,

    /// Session torn down after a failure, waiting to reconnect
    Failed { reason: String },
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Counters accumulated over the lifetime of the supervisor
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionStats {
    pub chunks_received: u64,
    pub samples_published: [u64; ChannelKind::COUNT],
    pub decode_errors: u64,
    pub publish_errors: u64,
    pub reconnects: u64,
}

impl SessionStats {
    pub fn record_published(&mut self, kind: ChannelKind) {
        self.samples_published[kind.index()] += 1;
    }

    pub fn published(&self, kind: ChannelKind) -> u64 {
        self.samples_published[kind.index()]
    }

    pub fn total_published(&self) -> u64 {
        self.samples_published.iter().sum()
    }
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chunks={} acc={} bvp={} gsr={} tmp={} decode_errors={} publish_errors={} reconnects={}",
            self.chunks_received,
            self.published(ChannelKind::Acceleration),
            self.published(ChannelKind::BloodVolumePulse),
            self.published(ChannelKind::SkinConductance),
            self.published(ChannelKind::Temperature),
            self.decode_errors,
            self.publish_errors,
            self.reconnects
        )
    }
}
