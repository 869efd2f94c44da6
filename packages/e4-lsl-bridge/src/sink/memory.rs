//! In-memory sink that records channels and samples

use super::{ChannelHandle, OutputSink};
use crate::channels::{ChannelDescriptor, ChannelKind, Sample};
use crate::types::{BridgeError, BridgeResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// A channel as it was requested from the sink
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedChannel {
    pub name: String,
    pub source_id: String,
    pub descriptor: ChannelDescriptor,
}

#[derive(Default)]
struct MemoryInner {
    channels: Vec<CreatedChannel>,
    published: Vec<(ChannelHandle, Sample)>,
}

/// Sink whose clones share one record
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels(&self) -> Vec<CreatedChannel> {
        self.inner.lock().channels.clone()
    }

    pub fn published(&self) -> Vec<(ChannelHandle, Sample)> {
        self.inner.lock().published.clone()
    }

    /// Samples published on the channel of `kind`, in publish order
    pub fn samples_of(&self, kind: ChannelKind) -> Vec<Sample> {
        let inner = self.inner.lock();
        inner
            .published
            .iter()
            .filter(|(handle, _)| {
                inner
                    .channels
                    .get(handle.0)
                    .is_some_and(|c| c.descriptor.kind == kind)
            })
            .map(|(_, sample)| sample.clone())
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn create_channel(
        &mut self,
        descriptor: &ChannelDescriptor,
        instance: &str,
    ) -> BridgeResult<ChannelHandle> {
        let mut inner = self.inner.lock();
        inner.channels.push(CreatedChannel {
            name: descriptor.stream_name(instance),
            source_id: descriptor.source_id(instance),
            descriptor: descriptor.clone(),
        });
        Ok(ChannelHandle(inner.channels.len() - 1))
    }

    fn publish(&mut self, channel: ChannelHandle, sample: &Sample) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        if channel.0 >= inner.channels.len() {
            return Err(BridgeError::Sink(format!("unknown channel {}", channel.0)));
        }
        inner.published.push((channel, sample.clone()));
        Ok(())
    }
}
