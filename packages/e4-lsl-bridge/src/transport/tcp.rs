// TCP transport to the E4 streaming server

use super::{Connector, Transport, COMMAND_TERMINATOR};
use crate::types::{BridgeError, BridgeResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: String, port: u16, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            host,
            port,
            connect_timeout,
            read_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self) -> BridgeResult<Box<dyn Transport>> {
        let addr = self.endpoint();
        log::info!("Connecting to server at {}", addr);

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(BridgeError::Connect(format!(
                    "TCP connection to {} failed: {}",
                    addr, e
                )))
            }
            Err(_) => {
                return Err(BridgeError::Connect(format!(
                    "TCP connection to {} timed out after {:?}",
                    addr, self.connect_timeout
                )))
            }
        };

        // Commands are tiny and each one waits for its reply
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Could not disable Nagle on {}: {}", addr, e);
        }

        log::info!("TCP connected to {}", addr);

        Ok(Box::new(TcpTransport::new(stream, self.read_timeout)))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct TcpTransport {
    stream: TcpStream,
    read_timeout: Duration,
    closed: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, read_timeout: Duration) -> Self {
        Self {
            stream,
            read_timeout,
            closed: false,
        }
    }

    /// Map socket errors onto the transport taxonomy, marking the transport
    /// closed when the peer is gone
    fn classify(&mut self, e: std::io::Error) -> BridgeError {
        match e.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::NotConnected => {
                self.closed = true;
                BridgeError::ConnectionClosed
            }
            _ => BridgeError::Io(e),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_line(&mut self, line: &str) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::ConnectionClosed);
        }

        let mut payload = String::with_capacity(line.len() + COMMAND_TERMINATOR.len());
        payload.push_str(line);
        payload.push_str(COMMAND_TERMINATOR);

        if let Err(e) = self.stream.write_all(payload.as_bytes()).await {
            return Err(self.classify(e));
        }
        if let Err(e) = self.stream.flush().await {
            return Err(self.classify(e));
        }

        Ok(())
    }

    async fn recv(&mut self, max_bytes: usize) -> BridgeResult<Vec<u8>> {
        if self.closed {
            return Err(BridgeError::ConnectionClosed);
        }

        let mut buf = vec![0u8; max_bytes.max(1)];
        match tokio::time::timeout(self.read_timeout, self.stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                self.closed = true;
                Err(BridgeError::ConnectionClosed)
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(e)) => Err(self.classify(e)),
            Err(_) => Err(BridgeError::Timeout(format!(
                "no data within {:?}",
                self.read_timeout
            ))),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown().await {
            log::debug!("TCP shutdown failed: {}", e);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
