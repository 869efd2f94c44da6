// Session configuration
//
// Built by the binary from command-line arguments; validated once before the
// supervisor starts.

use crate::types::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 28000;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// How replies carrying `ERR` are treated during the handshake
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Log rejections and continue
    #[default]
    Log,
    /// Fail the handshake on the first rejection
    Strict,
}

/// How response chunks are cut into protocol lines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Every chunk stands alone; its final segment is discarded
    #[default]
    Chunk,
    /// An unterminated tail is kept and prefixed to the next chunk
    CarryPartial,
}

/// Delay schedule between reconnect attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt; doubles for each consecutive failure
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts tolerated; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (1-based), or `None` once the
    /// attempt budget is spent
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.initial_delay.saturating_mul(1u32 << exponent);
        Some(delay.min(self.max_delay))
    }
}

/// Everything the supervisor needs to run one bridge instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub address: String,
    pub port: u16,
    pub device_id: String,
    /// Suffix that keeps output channels of concurrent instances apart
    pub instance_name: String,
    pub buffer_size: usize,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// Pause after `pause ON` and after creating output channels
    pub settle_delay: Duration,
    pub reconnect: ReconnectPolicy,
    pub ack_policy: AckPolicy,
    pub line_mode: LineMode,
}

impl SessionConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            device_id: device_id.into(),
            instance_name: String::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE,
            reconnect: ReconnectPolicy::default(),
            ack_policy: AckPolicy::default(),
            line_mode: LineMode::default(),
        }
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "device id must not be empty".to_string(),
            ));
        }
        if self.device_id.split_whitespace().count() > 1 {
            return Err(BridgeError::InvalidConfig(format!(
                "device id '{}' must be a single token",
                self.device_id
            )));
        }
        if self.buffer_size == 0 {
            return Err(BridgeError::InvalidConfig(
                "buffer size must be positive".to_string(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(BridgeError::InvalidConfig(
                "read timeout must be positive".to_string(),
            ));
        }
        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(BridgeError::InvalidConfig(
                "initial reconnect delay exceeds the maximum delay".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_immediate_and_unbounded() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::ZERO));
        assert_eq!(policy.delay_for(1_000_000), Some(Duration::ZERO));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            max_attempts: Some(5),
        };
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn test_validate() {
        assert!(SessionConfig::new("9ff167").validate().is_ok());
        assert!(SessionConfig::new("").validate().is_err());
        assert!(SessionConfig::new("two words").validate().is_err());

        let mut config = SessionConfig::new("9ff167");
        config.buffer_size = 0;
        assert!(matches!(
            config.validate(),
            Err(BridgeError::InvalidConfig(_))
        ));

        let mut config = SessionConfig::new("9ff167");
        config.read_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
