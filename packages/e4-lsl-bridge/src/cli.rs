use clap::{Parser, ValueEnum};
use e4_lsl_bridge::config::{DEFAULT_ADDRESS, DEFAULT_BUFFER_SIZE, DEFAULT_PORT};
use e4_lsl_bridge::{AckPolicy, LineMode, ReconnectPolicy, SessionConfig};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Newline-delimited JSON on stdout
    Ndjson,
    /// Lab Streaming Layer outlets
    Lsl,
}

#[cfg(feature = "lsl-support")]
const DEFAULT_SINK: &str = "lsl";
#[cfg(not(feature = "lsl-support"))]
const DEFAULT_SINK: &str = "ndjson";

#[derive(Parser)]
#[command(
    name = "e4-lsl",
    version,
    about = "Stream Empatica E4 sensor data from the E4 streaming server",
    long_about = "Connects to the E4 streaming server, subscribes to acceleration, BVP, GSR and\n\
                  temperature of one device, and republishes every sample on typed output\n\
                  channels. Reconnects automatically when the server or the device drops."
)]
pub struct Cli {
    /// Address of the E4 streaming server
    #[arg(long, env = "E4_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Port of the E4 streaming server
    #[arg(long, env = "E4_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum bytes read per receive
    #[arg(long, env = "E4_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Device id as listed by the server (e.g. 9ff167)
    #[arg(long, env = "E4_DEVICE")]
    pub device: String,

    /// Instance name appended to output channel names and ids
    #[arg(long, env = "E4_NAME", default_value = "")]
    pub name: String,

    /// Receive timeout in milliseconds; expiry triggers a reconnect
    #[arg(long, env = "E4_TIMEOUT_MS", default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[arg(long, env = "E4_CONNECT_TIMEOUT_MS", default_value_t = 3000)]
    pub connect_timeout_ms: u64,

    /// Pause after `pause ON` and after creating output channels
    #[arg(long, env = "E4_SETTLE_MS", default_value_t = 1000)]
    pub settle_ms: u64,

    /// Delay before the first reconnect attempt; doubles per failed attempt
    #[arg(long, env = "E4_RECONNECT_DELAY_MS", default_value_t = 0)]
    pub reconnect_delay_ms: u64,

    /// Upper bound for the reconnect delay
    #[arg(long, env = "E4_MAX_RECONNECT_DELAY_MS", default_value_t = 30_000)]
    pub max_reconnect_delay_ms: u64,

    /// Consecutive failed reconnect attempts before giving up (default: never)
    #[arg(long, env = "E4_MAX_RECONNECTS")]
    pub max_reconnects: Option<u32>,

    /// Fail when the server rejects a handshake command
    #[arg(long, env = "E4_STRICT_ACKS", default_value_t = false)]
    pub strict_acks: bool,

    /// Join data lines split across receives instead of dropping them
    #[arg(long, env = "E4_CARRY_PARTIAL_LINES", default_value_t = false)]
    pub carry_partial_lines: bool,

    /// Where decoded samples are published
    #[arg(long, env = "E4_SINK", value_enum, default_value = DEFAULT_SINK)]
    pub sink: SinkKind,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Warn;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            address: self.address.clone(),
            port: self.port,
            instance_name: self.name.clone(),
            buffer_size: self.buffer_size,
            read_timeout: Duration::from_millis(self.timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(self.reconnect_delay_ms),
                max_delay: Duration::from_millis(self.max_reconnect_delay_ms),
                max_attempts: self.max_reconnects,
            },
            ack_policy: if self.strict_acks {
                AckPolicy::Strict
            } else {
                AckPolicy::Log
            },
            line_mode: if self.carry_partial_lines {
                LineMode::CarryPartial
            } else {
                LineMode::Chunk
            },
            ..SessionConfig::new(self.device.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_vendor_setup() {
        let cli = Cli::parse_from(["e4-lsl", "--device", "9ff167"]);
        let config = cli.session_config();

        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 28000);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.device_id, "9ff167");
        assert_eq!(config.instance_name, "");
        assert_eq!(config.read_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.ack_policy, AckPolicy::Log);
        assert_eq!(config.line_mode, LineMode::Chunk);
        assert_eq!(cli.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "e4-lsl",
            "--device",
            "abc",
            "--name",
            "left",
            "--port",
            "28001",
            "--max-reconnects",
            "3",
            "--reconnect-delay-ms",
            "250",
            "--strict-acks",
            "--carry-partial-lines",
            "--sink",
            "ndjson",
            "-vv",
        ]);
        let config = cli.session_config();

        assert_eq!(config.instance_name, "left");
        assert_eq!(config.port, 28001);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.ack_policy, AckPolicy::Strict);
        assert_eq!(config.line_mode, LineMode::CarryPartial);
        assert_eq!(cli.sink, SinkKind::Ndjson);
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
    }

    #[test]
    fn test_device_is_required() {
        assert!(Cli::try_parse_from(["e4-lsl"]).is_err());
    }
}
