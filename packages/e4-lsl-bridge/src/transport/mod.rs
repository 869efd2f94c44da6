// Transport to the E4 streaming server
//
// A `Connector` opens fresh `Transport`s; the supervisor asks for a new one on
// every (re)connect and drops the old one. Receives are bounded by a timeout
// and fail distinctly on timeout (`BridgeError::Timeout`) and on connection
// loss (`BridgeError::ConnectionClosed`).
//
// Implementations:
// - `tcp`: tokio TCP socket (the real server)
// - `mock`: scripted replies for tests

pub mod mock;
mod tcp;

use crate::types::BridgeResult;
use async_trait::async_trait;

pub use mock::{MockConnector, MockReply, MockTransport};
pub use tcp::{TcpConnector, TcpTransport};

/// Line terminator for outbound commands
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// A bidirectional byte stream to the streaming server
#[async_trait]
pub trait Transport: Send {
    /// Send one command line; the terminator is appended by the transport
    async fn send_line(&mut self, line: &str) -> BridgeResult<()>;

    /// Receive one response chunk of at most `max_bytes` bytes
    ///
    /// Never returns an empty chunk: end of stream is `ConnectionClosed`.
    async fn recv(&mut self, max_bytes: usize) -> BridgeResult<Vec<u8>>;

    /// Close the connection. Further sends fail with `ConnectionClosed`.
    async fn close(&mut self);

    /// Whether the transport is known to be closed
    fn is_closed(&self) -> bool;
}

/// Opens new transports to a fixed endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> BridgeResult<Box<dyn Transport>>;

    /// Human-readable endpoint for logging
    fn endpoint(&self) -> String;
}
