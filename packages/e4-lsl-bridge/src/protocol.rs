// Control protocol of the E4 streaming server
//
// Commands are single CRLF-terminated text lines. Each command gets exactly
// one response chunk, which normally starts with `R <command>` and may end in
// `OK` or `ERR <reason>`. After `pause OFF` the server interleaves unsolicited
// data lines on the same connection.

use crate::channels::ChannelKind;
use crate::config::AckPolicy;
use crate::transport::Transport;
use crate::types::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TEARDOWN_ATTEMPTS: u32 = 3;
const TEARDOWN_BACKOFF: Duration = Duration::from_millis(100);

/// The fixed command set understood by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DeviceList,
    DeviceConnect(String),
    Pause(bool),
    Subscribe(ChannelKind),
    DeviceDisconnect,
}

impl Command {
    /// Command name as it appears at the start of the wire line and the reply
    pub fn name(&self) -> &'static str {
        match self {
            Command::DeviceList => "device_list",
            Command::DeviceConnect(_) => "device_connect",
            Command::Pause(_) => "pause",
            Command::Subscribe(_) => "device_subscribe",
            Command::DeviceDisconnect => "device_disconnect",
        }
    }

    /// Wire line without terminator
    pub fn to_line(&self) -> String {
        match self {
            Command::DeviceList | Command::DeviceDisconnect => self.name().to_string(),
            Command::DeviceConnect(device) => format!("{} {}", self.name(), device),
            Command::Pause(on) => format!("{} {}", self.name(), on_off(*on)),
            Command::Subscribe(kind) => format!(
                "{} {} ON",
                self.name(),
                kind.descriptor().subscription
            ),
        }
    }

    /// The full setup sequence for one device, in wire order
    pub fn handshake(device: &str) -> Vec<Command> {
        let mut commands = vec![
            Command::DeviceList,
            Command::DeviceConnect(device.to_string()),
            Command::Pause(true),
        ];
        commands.extend(ChannelKind::ALL.iter().copied().map(Command::Subscribe));
        commands.push(Command::Pause(false));
        commands
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

/// Status carried by a server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckStatus {
    Ok,
    /// Reply without an explicit status, e.g. `R pause ON`
    Unspecified,
    Err(String),
}

/// A parsed `R <command> ...` reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub command: String,
    pub status: AckStatus,
}

impl Acknowledgement {
    /// Parse the first reply line of a response chunk
    pub fn parse(response: &str) -> Option<Self> {
        let line = response
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("R "))?;
        let mut tokens = line.split_whitespace().skip(1);
        let command = tokens.next()?.to_string();
        let rest: Vec<&str> = tokens.collect();

        let status = match rest.iter().position(|t| *t == "ERR") {
            Some(pos) => AckStatus::Err(rest[pos + 1..].join(" ")),
            None if rest.last() == Some(&"OK") => AckStatus::Ok,
            None => AckStatus::Unspecified,
        };

        Some(Self { command, status })
    }
}

/// A device advertised in the `device_list` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    /// Whether the server reports the device as allowed for this licence
    pub allowed: bool,
}

/// Parse `R device_list <n> | <id> <name> [allowed] | ...`
pub fn parse_device_list(response: &str) -> Vec<DeviceInfo> {
    let Some(line) = response
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("R device_list"))
    else {
        return Vec::new();
    };

    line.split('|')
        .skip(1)
        .filter_map(|entry| {
            let mut tokens = entry.split_whitespace();
            let id = tokens.next()?.to_string();
            let name = tokens.next().unwrap_or_default().to_string();
            let allowed = tokens.any(|t| t.eq_ignore_ascii_case("allowed"));
            Some(DeviceInfo { id, name, allowed })
        })
        .collect()
}

/// Drives command/response turns over a borrowed transport
pub struct ControlClient<'a> {
    transport: &'a mut dyn Transport,
    buffer_size: usize,
    ack_policy: AckPolicy,
}

impl<'a> ControlClient<'a> {
    pub fn new(transport: &'a mut dyn Transport, buffer_size: usize, ack_policy: AckPolicy) -> Self {
        Self {
            transport,
            buffer_size,
            ack_policy,
        }
    }

    /// One conversation turn: send the command, receive one chunk, log it
    pub async fn exchange(&mut self, command: &Command) -> BridgeResult<String> {
        let line = command.to_line();
        log::info!("> {}", line);
        self.transport.send_line(&line).await?;

        let chunk = self.transport.recv(self.buffer_size).await?;
        let response = String::from_utf8_lossy(&chunk).into_owned();
        log::info!("< {}", response.trim_end());

        self.check_ack(command, &response)?;
        Ok(response)
    }

    fn check_ack(&self, command: &Command, response: &str) -> BridgeResult<()> {
        let Some(ack) = Acknowledgement::parse(response) else {
            log::debug!("No acknowledgement line in reply to '{}'", command.name());
            return Ok(());
        };

        if ack.command != command.name() {
            log::debug!(
                "Reply names '{}' while '{}' was sent",
                ack.command,
                command.name()
            );
        }

        if let AckStatus::Err(reason) = ack.status {
            match self.ack_policy {
                AckPolicy::Strict => {
                    return Err(BridgeError::Rejected {
                        command: command.to_line(),
                        reason,
                    })
                }
                AckPolicy::Log => {
                    log::warn!("Server rejected '{}': {}", command.to_line(), reason);
                }
            }
        }

        Ok(())
    }

    /// Run the full setup sequence for `device`
    ///
    /// `settle` is waited after `pause ON`, before the subscriptions.
    pub async fn handshake(&mut self, device: &str, settle: Duration) -> BridgeResult<()> {
        for command in Command::handshake(device) {
            let response = self.exchange(&command).await?;

            match &command {
                Command::DeviceList => {
                    let devices = parse_device_list(&response);
                    for info in &devices {
                        log::info!(
                            "Available device: {} ({}){}",
                            info.id,
                            info.name,
                            if info.allowed { "" } else { " [not allowed]" }
                        );
                    }
                    if !devices.is_empty() && !devices.iter().any(|d| d.id == device) {
                        log::warn!("Device '{}' is not in the server's device list", device);
                    }
                }
                Command::Pause(true) if !settle.is_zero() => {
                    tokio::time::sleep(settle).await;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Ask the server to release the device
    ///
    /// Send failures other than a closed connection are retried with
    /// doubling backoff. The reply is logged if one arrives.
    pub async fn disconnect(&mut self) -> BridgeResult<()> {
        let line = Command::DeviceDisconnect.to_line();
        let mut delay = TEARDOWN_BACKOFF;
        let mut attempt = 1;

        loop {
            log::info!("> {}", line);
            match self.transport.send_line(&line).await {
                Ok(()) => break,
                Err(BridgeError::ConnectionClosed) => return Err(BridgeError::ConnectionClosed),
                Err(e) if attempt < TEARDOWN_ATTEMPTS => {
                    log::warn!(
                        "Sending '{}' failed (attempt {}/{}): {}, retrying in {:?}",
                        line,
                        attempt,
                        TEARDOWN_ATTEMPTS,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        match self.transport.recv(self.buffer_size).await {
            Ok(chunk) => log::info!("< {}", String::from_utf8_lossy(&chunk).trim_end()),
            Err(e) => log::debug!("No reply to '{}': {}", line, e),
        }

        Ok(())
    }
}
