// Session supervisor - connect, subscribe, stream, detect failure, reconnect
//
// The supervisor owns the only live transport and the output channels. It
// runs the handshake on a fresh transport, then decodes and republishes
// incoming chunks until the server times out, closes the connection or
// reports the device lost, and then starts over. Failures before the first
// successful handshake are returned to the caller. Cancellation is polled at
// loop boundaries; on cancellation the device is released explicitly.

use crate::channels::Sample;
use crate::config::SessionConfig;
use crate::decoder::{ChunkOutcome, LineAssembler};
use crate::protocol::ControlClient;
use crate::sink::{OutputChannels, OutputSink};
use crate::transport::{Connector, Transport};
use crate::types::{BridgeError, BridgeResult, SessionState, SessionStats};
use tokio_util::sync::CancellationToken;

/// One device bound to one open transport
pub struct Session {
    device_id: String,
    transport: Box<dyn Transport>,
}

impl Session {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn close(&mut self) {
        self.transport.close().await;
    }
}

pub struct Supervisor<C, S> {
    config: SessionConfig,
    connector: C,
    sink: S,
    channels: Option<OutputChannels>,
    assembler: LineAssembler,
    state: SessionState,
    stats: SessionStats,
}

impl<C: Connector, S: OutputSink> Supervisor<C, S> {
    pub fn new(config: SessionConfig, connector: C, sink: S) -> Self {
        let assembler = LineAssembler::new(config.line_mode);
        Self {
            config,
            connector,
            sink,
            channels: None,
            assembler,
            state: SessionState::Disconnected,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether the output channels exist yet
    pub fn has_channels(&self) -> bool {
        self.channels.is_some()
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::info!("Session state: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run until cancelled, or until a failure that cannot be recovered
    ///
    /// Returns the accumulated statistics on a clean cancellation.
    pub async fn run(&mut self, cancel: CancellationToken) -> BridgeResult<SessionStats> {
        let mut attempt: u32 = 0;
        let mut established = false;

        loop {
            if cancel.is_cancelled() {
                return Ok(self.finish());
            }

            self.set_state(SessionState::Handshaking);

            let failure = match self.establish().await {
                Ok(mut session) => {
                    attempt = 0;
                    if !established {
                        if let Err(e) = self.create_channels().await {
                            session.close().await;
                            self.set_state(SessionState::Disconnected);
                            return Err(e);
                        }
                        established = true;
                    }

                    self.set_state(SessionState::Streaming);
                    match self.stream(&mut session, &cancel).await {
                        Ok(()) => {
                            self.teardown(session).await;
                            return Ok(self.finish());
                        }
                        Err(e) => {
                            session.close().await;
                            e
                        }
                    }
                }
                Err(e) if !established => {
                    log::error!("Initial connection failed: {}", e);
                    self.set_state(SessionState::Disconnected);
                    return Err(e);
                }
                Err(e) => e,
            };

            self.assembler.reset();
            self.set_state(SessionState::Failed {
                reason: failure.to_string(),
            });

            attempt += 1;
            let Some(delay) = self.config.reconnect.delay_for(attempt) else {
                log::error!(
                    "Giving up after {} failed reconnect attempts, last error: {}",
                    attempt - 1,
                    failure
                );
                self.set_state(SessionState::Disconnected);
                return Err(BridgeError::ReconnectExhausted {
                    attempts: attempt - 1,
                });
            };

            self.stats.reconnects += 1;
            log::warn!(
                "Reconnecting (attempt {}) in {:?} after: {}",
                attempt,
                delay,
                failure
            );

            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        log::info!("Cancelled while waiting to reconnect");
                        return Ok(self.finish());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// Open a transport and run the command sequence on it
    async fn establish(&mut self) -> BridgeResult<Session> {
        let mut transport = self.connector.open().await?;

        let handshake = {
            let mut client = ControlClient::new(
                transport.as_mut(),
                self.config.buffer_size,
                self.config.ack_policy,
            );
            client
                .handshake(&self.config.device_id, self.config.settle_delay)
                .await
        };

        if let Err(e) = handshake {
            transport.close().await;
            return Err(e);
        }

        Ok(Session {
            device_id: self.config.device_id.clone(),
            transport,
        })
    }

    async fn create_channels(&mut self) -> BridgeResult<()> {
        let channels = OutputChannels::create(&mut self.sink, &self.config.instance_name)?;
        self.channels = Some(channels);

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        Ok(())
    }

    /// Receive, decode and publish until cancelled (`Ok`) or failed (`Err`)
    async fn stream(
        &mut self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> BridgeResult<()> {
        log::info!("Streaming from device {}", session.device_id);

        loop {
            if cancel.is_cancelled() {
                log::info!("Cancellation requested");
                return Ok(());
            }

            let chunk = match session.transport.recv(self.config.buffer_size).await {
                Ok(chunk) => chunk,
                Err(e) if cancel.is_cancelled() => {
                    log::debug!("Receive ended during cancellation: {}", e);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Streaming interrupted: {}", e);
                    return Err(e);
                }
            };
            self.stats.chunks_received += 1;

            match self.assembler.feed(&chunk) {
                ChunkOutcome::DeviceLost(message) => {
                    log::warn!("Server reported device loss: {}", message);
                    return Err(BridgeError::DeviceLost(message));
                }
                ChunkOutcome::Lines(lines) => {
                    for line in lines {
                        match line {
                            Ok(sample) => self.publish(&sample),
                            Err(e) => {
                                self.stats.decode_errors += 1;
                                log::warn!("Skipping line: {}", e);
                            }
                        }
                    }
                }
            }
        }
    }

    fn publish(&mut self, sample: &Sample) {
        let Some(channels) = &self.channels else {
            return;
        };

        match channels.publish(&mut self.sink, sample) {
            Ok(()) => self.stats.record_published(sample.kind),
            Err(e) => {
                self.stats.publish_errors += 1;
                log::error!("Failed to publish {:?} sample: {}", sample.kind, e);
            }
        }
    }

    /// Release the device and close the transport
    async fn teardown(&mut self, mut session: Session) {
        log::info!("Disconnecting from device {}", session.device_id);

        if !session.transport.is_closed() {
            let mut client = ControlClient::new(
                session.transport.as_mut(),
                self.config.buffer_size,
                self.config.ack_policy,
            );
            if let Err(e) = client.disconnect().await {
                log::warn!("Device teardown incomplete: {}", e);
            }
        }

        session.close().await;
    }

    fn finish(&mut self) -> SessionStats {
        self.set_state(SessionState::Disconnected);
        log::info!("Session finished: {}", self.stats);
        self.stats.clone()
    }
}
