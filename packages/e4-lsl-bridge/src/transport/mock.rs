//! Scripted transport for tests
//!
//! Each call to [`MockConnector::open`] consumes the next scripted session.
//! Receives pop replies off that session's script; every sent line is
//! recorded so tests can assert the exact command sequence.

use super::{Connector, Transport};
use crate::types::{BridgeError, BridgeResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One scripted outcome of `Transport::recv`
#[derive(Debug, Clone)]
pub enum MockReply {
    Chunk(Vec<u8>),
    Timeout,
    Closed,
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        MockReply::Chunk(text.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct ConnectorInner {
    sessions: VecDeque<Vec<MockReply>>,
    sent: Vec<Arc<Mutex<Vec<String>>>>,
}

/// Connector handing out scripted sessions in order
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<ConnectorInner>>,
    cancel_when_drained: Option<CancellationToken>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session whose receives return `replies` in order
    pub fn with_session(self, replies: Vec<MockReply>) -> Self {
        self.inner.lock().sessions.push_back(replies);
        self
    }

    /// Cancel `token` when a session runs out of replies
    ///
    /// The receive that finds the script empty then reports a timeout, so the
    /// caller observes the cancellation at its next loop boundary.
    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.cancel_when_drained = Some(token);
        self
    }

    /// Number of sessions opened so far
    pub fn opened(&self) -> usize {
        self.inner.lock().sent.len()
    }

    /// Lines sent on the `index`-th opened session
    pub fn sent_lines(&self, index: usize) -> Vec<String> {
        self.inner
            .lock()
            .sent
            .get(index)
            .map(|lines| lines.lock().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self) -> BridgeResult<Box<dyn Transport>> {
        let mut inner = self.inner.lock();
        let replies = inner
            .sessions
            .pop_front()
            .ok_or_else(|| BridgeError::Connect("no scripted session left".to_string()))?;

        let sent = Arc::new(Mutex::new(Vec::new()));
        inner.sent.push(Arc::clone(&sent));

        Ok(Box::new(MockTransport {
            replies: replies.into(),
            sent,
            closed: false,
            cancel_when_drained: self.cancel_when_drained.clone(),
        }))
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}

pub struct MockTransport {
    replies: VecDeque<MockReply>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: bool,
    cancel_when_drained: Option<CancellationToken>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_line(&mut self, line: &str) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::ConnectionClosed);
        }
        self.sent.lock().push(line.to_string());
        Ok(())
    }

    async fn recv(&mut self, max_bytes: usize) -> BridgeResult<Vec<u8>> {
        if self.closed {
            return Err(BridgeError::ConnectionClosed);
        }

        match self.replies.pop_front() {
            Some(MockReply::Chunk(mut bytes)) => {
                bytes.truncate(max_bytes);
                Ok(bytes)
            }
            Some(MockReply::Timeout) => Err(BridgeError::Timeout("scripted".to_string())),
            Some(MockReply::Closed) => {
                self.closed = true;
                Err(BridgeError::ConnectionClosed)
            }
            None => match &self.cancel_when_drained {
                Some(token) => {
                    token.cancel();
                    Err(BridgeError::Timeout("script drained".to_string()))
                }
                None => {
                    self.closed = true;
                    Err(BridgeError::ConnectionClosed)
                }
            },
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
