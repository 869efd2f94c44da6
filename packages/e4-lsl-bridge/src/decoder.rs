// Decoder for unsolicited data lines
//
// A response chunk holds zero or more newline-terminated lines of the form
// `<tag> <timestamp> <value...>`. Numeric tokens use either comma or period
// as decimal separator. Lines with unknown tags are status traffic and are
// skipped; a malformed line fails on its own without affecting its
// neighbours. A chunk mentioning a lost device supersedes everything else in
// it.

use crate::channels::{ChannelKind, ElementType, Sample, SampleValues};
use crate::config::LineMode;
use crate::types::{BridgeError, BridgeResult};

/// Marker the server sends when the wearable drops off
pub const DEVICE_LOST_MARKER: &str = "connection lost to device";

/// Index of the first value token; the timestamp sits before it
const VALUE_OFFSET: usize = 2;

/// One tagged line split into tokens
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolLine<'a> {
    pub tag: &'a str,
    /// Tokens after the tag, timestamp first
    pub tokens: Vec<&'a str>,
}

impl<'a> ProtocolLine<'a> {
    /// `None` for blank lines
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let tag = tokens.next()?;
        Some(Self {
            tag,
            tokens: tokens.collect(),
        })
    }
}

/// Result of decoding one chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The server reported that the device dropped; no samples were decoded
    DeviceLost(String),
    /// Per recognised line, in arrival order
    Lines(Vec<BridgeResult<Sample>>),
}

/// Replace a comma decimal separator with a period
pub fn normalize_decimal(token: &str) -> String {
    token.replace(',', ".")
}

fn decode_error(line: &str, reason: impl Into<String>) -> BridgeError {
    BridgeError::Decode {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Decode one line
///
/// Returns `None` for blank lines and unrecognised tags.
pub fn decode_line(line: &str) -> Option<BridgeResult<Sample>> {
    let parsed = ProtocolLine::parse(line)?;
    let kind = ChannelKind::from_wire_tag(parsed.tag)?;
    let descriptor = kind.descriptor();

    let start = VALUE_OFFSET - 1;
    let end = start + descriptor.channel_count;
    let Some(raw) = parsed.tokens.get(start..end) else {
        return Some(Err(decode_error(
            line,
            format!(
                "expected {} value(s) after the timestamp, found {}",
                descriptor.channel_count,
                parsed.tokens.len().saturating_sub(start)
            ),
        )));
    };

    let device_timestamp = parsed
        .tokens
        .first()
        .and_then(|t| normalize_decimal(t).parse::<f64>().ok());

    let values = match descriptor.element_type {
        ElementType::Int32 => raw
            .iter()
            .map(|t| {
                normalize_decimal(t)
                    .parse::<i32>()
                    .map_err(|e| decode_error(line, format!("'{}' is not an integer: {}", t, e)))
            })
            .collect::<BridgeResult<Vec<_>>>()
            .map(SampleValues::Int),
        ElementType::Float32 => raw
            .iter()
            .map(|t| {
                normalize_decimal(t)
                    .parse::<f32>()
                    .map_err(|e| decode_error(line, format!("'{}' is not a number: {}", t, e)))
            })
            .collect::<BridgeResult<Vec<_>>>()
            .map(SampleValues::Float),
    };

    Some(values.map(|values| Sample {
        kind,
        device_timestamp,
        values,
    }))
}

/// Decode every complete line of `text`
///
/// The segment after the last newline is not a complete line and is ignored.
pub fn decode_chunk(text: &str) -> ChunkOutcome {
    if text.contains(DEVICE_LOST_MARKER) {
        return ChunkOutcome::DeviceLost(text.trim().to_string());
    }

    let mut segments: Vec<&str> = text.split('\n').collect();
    segments.pop();

    ChunkOutcome::Lines(segments.into_iter().filter_map(decode_line).collect())
}

/// Turns successive receive chunks into decoded lines
#[derive(Debug, Default)]
pub struct LineAssembler {
    mode: LineMode,
    pending: String,
}

impl LineAssembler {
    pub fn new(mode: LineMode) -> Self {
        Self {
            mode,
            pending: String::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> ChunkOutcome {
        let text = String::from_utf8_lossy(chunk);

        if text.contains(DEVICE_LOST_MARKER) {
            self.pending.clear();
            return ChunkOutcome::DeviceLost(text.trim().to_string());
        }

        match self.mode {
            LineMode::Chunk => {
                if let Some(tail) = text.rsplit('\n').next().filter(|t| !t.trim().is_empty()) {
                    log::debug!("Discarding unterminated tail: {:?}", tail);
                }
                decode_chunk(&text)
            }
            LineMode::CarryPartial => {
                self.pending.push_str(&text);
                let Some(split) = self.pending.rfind('\n') else {
                    return ChunkOutcome::Lines(Vec::new());
                };
                let tail = self.pending.split_off(split + 1);
                let complete = std::mem::replace(&mut self.pending, tail);
                decode_chunk(&complete)
            }
        }
    }

    /// Drop any carried partial line, e.g. before reconnecting
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}
