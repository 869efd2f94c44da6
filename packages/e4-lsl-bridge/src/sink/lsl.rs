// Lab Streaming Layer sink
//
// One LSL outlet per sensor kind. Outlets are announced on the network as
// soon as they are created and stay alive for the lifetime of the sink, so
// recorders keep their subscription across device reconnects.

use super::{ChannelHandle, OutputSink};
use crate::channels::{ChannelDescriptor, ElementType, Sample, SampleValues};
use crate::types::{BridgeError, BridgeResult};
use lsl::{ChannelFormat, Pushable, StreamInfo, StreamOutlet};

/// Seconds of data an outlet buffers for slow consumers
const MAX_BUFFERED_SECS: i32 = 360;

#[derive(Default)]
pub struct LslSink {
    outlets: Vec<StreamOutlet>,
}

impl LslSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_format(element_type: ElementType) -> ChannelFormat {
        match element_type {
            ElementType::Int32 => ChannelFormat::Int32,
            ElementType::Float32 => ChannelFormat::Float32,
        }
    }
}

impl OutputSink for LslSink {
    fn create_channel(
        &mut self,
        descriptor: &ChannelDescriptor,
        instance: &str,
    ) -> BridgeResult<ChannelHandle> {
        let info = StreamInfo::new(
            &descriptor.stream_name(instance),
            descriptor.category,
            descriptor.channel_count as u32,
            descriptor.nominal_rate,
            Self::channel_format(descriptor.element_type),
            &descriptor.source_id(instance),
        )
        .map_err(|e| BridgeError::Sink(format!("Failed to describe LSL stream: {:?}", e)))?;

        let outlet = StreamOutlet::new(&info, 0, MAX_BUFFERED_SECS)
            .map_err(|e| BridgeError::Sink(format!("Failed to create LSL outlet: {:?}", e)))?;

        self.outlets.push(outlet);
        Ok(ChannelHandle(self.outlets.len() - 1))
    }

    fn publish(&mut self, channel: ChannelHandle, sample: &Sample) -> BridgeResult<()> {
        let outlet = self
            .outlets
            .get(channel.0)
            .ok_or_else(|| BridgeError::Sink(format!("unknown channel {}", channel.0)))?;

        let pushed = match &sample.values {
            SampleValues::Int(values) => outlet.push_sample(values),
            SampleValues::Float(values) => outlet.push_sample(values),
        };

        pushed.map_err(|e| BridgeError::Sink(format!("LSL push failed: {:?}", e)))
    }
}
