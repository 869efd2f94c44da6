// Loopback stand-in for the E4 streaming server

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEVICE: &str = "9ff167";

/// Number of commands in the setup sequence
pub const HANDSHAKE_LEN: usize = 8;

const CHUNK_GAP: Duration = Duration::from_millis(100);

/// What the server does after sending a session's data
pub enum Ending {
    /// Report the device lost, then drop the connection
    DeviceLost,
    /// Drop the connection
    Close,
    /// Keep answering commands until `device_disconnect` arrives
    AwaitDisconnect,
}

pub struct ScriptedSession {
    pub chunks: Vec<String>,
    pub ending: Ending,
}

impl ScriptedSession {
    pub fn new(chunks: &[&str], ending: Ending) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ending,
        }
    }
}

pub struct FakeE4Server {
    pub port: u16,
    handle: JoinHandle<Vec<Vec<String>>>,
}

impl FakeE4Server {
    /// Serve `sessions` one connection at a time, then stop listening
    pub fn start(sessions: Vec<ScriptedSession>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            for session in sessions {
                let (stream, _) = listener.accept().unwrap();
                received.push(serve(stream, session));
            }
            received
        });

        Self { port, handle }
    }

    /// Commands received, per connection
    pub fn join(self) -> Vec<Vec<String>> {
        self.handle.join().unwrap()
    }
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn handshake_lines() -> Vec<String> {
    vec![
        "device_list".to_string(),
        format!("device_connect {}", DEVICE),
        "pause ON".to_string(),
        "device_subscribe acc ON".to_string(),
        "device_subscribe bvp ON".to_string(),
        "device_subscribe gsr ON".to_string(),
        "device_subscribe tmp ON".to_string(),
        "pause OFF".to_string(),
    ]
}

fn reply_to(command: &str) -> String {
    if command == "device_list" {
        format!("R device_list 1 | {} Empatica_E4 allowed\n", DEVICE)
    } else {
        format!("R {} OK\n", command)
    }
}

fn serve(stream: TcpStream, session: ScriptedSession) -> Vec<String> {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let mut received = Vec::new();

    while received.len() < HANDSHAKE_LEN {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return received;
        }
        let command = line.trim_end().to_string();
        writer.write_all(reply_to(&command).as_bytes()).unwrap();
        received.push(command);
    }

    for chunk in &session.chunks {
        thread::sleep(CHUNK_GAP);
        writer.write_all(chunk.as_bytes()).unwrap();
    }
    thread::sleep(CHUNK_GAP);

    match session.ending {
        Ending::DeviceLost => {
            let lost = format!("R connection lost to device {}\n", DEVICE);
            let _ = writer.write_all(lost.as_bytes());
        }
        Ending::Close => {}
        Ending::AwaitDisconnect => loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let command = line.trim_end().to_string();
                    let _ = writer.write_all(reply_to(&command).as_bytes());
                    let done = command == "device_disconnect";
                    received.push(command);
                    if done {
                        break;
                    }
                }
            }
        },
    }

    received
}
