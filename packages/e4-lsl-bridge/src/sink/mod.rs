// Output sinks for decoded samples
//
// The supervisor only needs two operations from a sink: create a named, typed
// channel once, and publish one sample to it. Implementations:
// - `ndjson`: one JSON object per line on any writer (stdout in the binary)
// - `memory`: records everything, for tests and embedding
// - `lsl`: Lab Streaming Layer outlets (feature `lsl-support`)

#[cfg(feature = "lsl-support")]
mod lsl;
mod memory;
mod ndjson;

use crate::channels::{ChannelDescriptor, ChannelKind, Sample};
use crate::types::{BridgeError, BridgeResult};
use serde::Serialize;

#[cfg(feature = "lsl-support")]
pub use lsl::LslSink;
pub use memory::{CreatedChannel, MemorySink};
pub use ndjson::NdjsonSink;

/// Opaque handle to a channel created by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelHandle(pub usize);

/// A publish target for decoded samples
pub trait OutputSink {
    /// Create the output channel for `descriptor`, named after `instance`
    fn create_channel(
        &mut self,
        descriptor: &ChannelDescriptor,
        instance: &str,
    ) -> BridgeResult<ChannelHandle>;

    /// Publish one sample on a channel created by this sink
    fn publish(&mut self, channel: ChannelHandle, sample: &Sample) -> BridgeResult<()>;
}

/// The four live output channels of one bridge instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChannels {
    handles: [ChannelHandle; ChannelKind::COUNT],
}

impl OutputChannels {
    /// Create one channel per sensor kind, in subscription order
    pub fn create<S: OutputSink + ?Sized>(sink: &mut S, instance: &str) -> BridgeResult<Self> {
        let mut handles = [ChannelHandle(0); ChannelKind::COUNT];
        for kind in ChannelKind::ALL {
            let descriptor = kind.descriptor();
            handles[kind.index()] = sink.create_channel(descriptor, instance)?;
            log::info!(
                "Created output channel {} ({} ch @ {} Hz, {:?}, id {})",
                descriptor.stream_name(instance),
                descriptor.channel_count,
                descriptor.nominal_rate,
                descriptor.element_type,
                descriptor.source_id(instance)
            );
        }
        Ok(Self { handles })
    }

    pub fn handle(&self, kind: ChannelKind) -> ChannelHandle {
        self.handles[kind.index()]
    }

    /// Publish `sample` on the channel of its kind
    ///
    /// Samples whose shape does not match the channel are refused.
    pub fn publish<S: OutputSink + ?Sized>(&self, sink: &mut S, sample: &Sample) -> BridgeResult<()> {
        if !sample.conforms() {
            return Err(BridgeError::Sink(format!(
                "sample for {:?} has {} value(s) of type {:?}",
                sample.kind,
                sample.values.len(),
                sample.values.element_type()
            )));
        }
        sink.publish(self.handle(sample.kind), sample)
    }
}
