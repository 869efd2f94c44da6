//! # e4-lsl-bridge
//!
//! Republishes the sensor streams of an Empatica E4 wristband, as served by
//! the vendor's TCP streaming server, on four typed output channels.
//!
//! The [`Supervisor`] drives the whole lifecycle: it opens a transport,
//! selects the device, subscribes to acceleration, blood volume pulse, skin
//! conductance and temperature, then decodes and republishes every sample.
//! When the server times out, drops the connection or reports the device
//! lost, the full handshake is repeated on a fresh connection.
//!
//! ```rust,ignore
//! use e4_lsl_bridge::{NdjsonSink, SessionConfig, Supervisor, TcpConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = SessionConfig::new("9ff167");
//! let connector = TcpConnector::new(
//!     config.address.clone(),
//!     config.port,
//!     config.connect_timeout,
//!     config.read_timeout,
//! );
//! let mut supervisor = Supervisor::new(config, connector, NdjsonSink::stdout());
//! let stats = supervisor.run(CancellationToken::new()).await?;
//! ```

pub mod channels;
pub mod config;
pub mod decoder;
pub mod protocol;
pub mod sink;
pub mod supervisor;
pub mod transport;
pub mod types;

pub use channels::{ChannelDescriptor, ChannelKind, ElementType, Sample, SampleValues};
pub use config::{AckPolicy, LineMode, ReconnectPolicy, SessionConfig};
pub use decoder::{decode_chunk, ChunkOutcome, LineAssembler};
pub use protocol::{Command, ControlClient};
pub use sink::{ChannelHandle, MemorySink, NdjsonSink, OutputChannels, OutputSink};
pub use supervisor::{Session, Supervisor};
pub use transport::{Connector, TcpConnector, Transport};
pub use types::{BridgeError, BridgeResult, SessionState, SessionStats};

#[cfg(feature = "lsl-support")]
pub use sink::LslSink;
