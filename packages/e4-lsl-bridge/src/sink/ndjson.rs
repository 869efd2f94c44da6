// Newline-delimited JSON sink
//
// Writes one `channel` record per created channel and one `sample` record per
// published sample. Each line is flushed so downstream readers see samples as
// they arrive.

use super::{ChannelHandle, OutputSink};
use crate::channels::{ChannelDescriptor, ElementType, Sample, SampleValues};
use crate::types::{BridgeError, BridgeResult};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Channel {
        channel: usize,
        name: &'a str,
        category: &'a str,
        channel_count: usize,
        nominal_rate: f64,
        element_type: ElementType,
        source_id: &'a str,
    },
    Sample {
        channel: usize,
        name: &'a str,
        timestamp: f64,
        device_timestamp: Option<f64>,
        values: &'a SampleValues,
    },
}

pub struct NdjsonSink<W: Write> {
    writer: W,
    names: Vec<String>,
}

impl NdjsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            names: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Record<'_>) -> BridgeResult<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| BridgeError::Sink(format!("JSON encoding failed: {}", e)))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn now_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0
}

impl<W: Write> OutputSink for NdjsonSink<W> {
    fn create_channel(
        &mut self,
        descriptor: &ChannelDescriptor,
        instance: &str,
    ) -> BridgeResult<ChannelHandle> {
        let handle = ChannelHandle(self.names.len());
        let name = descriptor.stream_name(instance);
        let source_id = descriptor.source_id(instance);

        self.write_record(&Record::Channel {
            channel: handle.0,
            name: &name,
            category: descriptor.category,
            channel_count: descriptor.channel_count,
            nominal_rate: descriptor.nominal_rate,
            element_type: descriptor.element_type,
            source_id: &source_id,
        })?;

        self.names.push(name);
        Ok(handle)
    }

    fn publish(&mut self, channel: ChannelHandle, sample: &Sample) -> BridgeResult<()> {
        let name = self
            .names
            .get(channel.0)
            .cloned()
            .ok_or_else(|| BridgeError::Sink(format!("unknown channel {}", channel.0)))?;

        self.write_record(&Record::Sample {
            channel: channel.0,
            name: &name,
            timestamp: now_secs(),
            device_timestamp: sample.device_timestamp,
            values: &sample.values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelKind;

    #[test]
    fn test_writes_channel_and_sample_records() {
        let mut sink = NdjsonSink::new(Vec::new());
        let handle = sink
            .create_channel(ChannelKind::Acceleration.descriptor(), "left")
            .unwrap();
        sink.publish(
            handle,
            &Sample {
                kind: ChannelKind::Acceleration,
                device_timestamp: Some(12.5),
                values: SampleValues::Int(vec![1, -2, 3]),
            },
        )
        .unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0]["type"], "channel");
        assert_eq!(lines[0]["name"], "acc_left");
        assert_eq!(lines[0]["source_id"], "ACC-e4_left");
        assert_eq!(lines[0]["channel_count"], 3);
        assert_eq!(lines[0]["element_type"], "Int32");

        assert_eq!(lines[1]["type"], "sample");
        assert_eq!(lines[1]["channel"], 0);
        assert_eq!(lines[1]["device_timestamp"], 12.5);
        assert_eq!(lines[1]["values"], serde_json::json!([1, -2, 3]));
    }

    #[test]
    fn test_unknown_channel_is_refused() {
        let mut sink = NdjsonSink::new(Vec::new());
        let result = sink.publish(
            ChannelHandle(7),
            &Sample {
                kind: ChannelKind::Temperature,
                device_timestamp: None,
                values: SampleValues::Float(vec![31.0]),
            },
        );
        assert!(matches!(result, Err(BridgeError::Sink(_))));
    }
}
