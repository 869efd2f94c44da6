// Sensor channel descriptors and decoded samples
//
// The E4 streams four independently typed signals over one connection. Each
// signal has a fixed descriptor: the tag it carries on the wire, the name the
// server expects in `device_subscribe`, and the shape of the output channel.

use serde::{Deserialize, Serialize};

/// Numeric element type of an output channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ElementType {
    /// 32-bit signed integer
    Int32,
    /// 32-bit floating point
    Float32,
}

/// The four sensor kinds the E4 server can stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// 3-axis accelerometer
    Acceleration,
    /// Blood volume pulse (photoplethysmography)
    BloodVolumePulse,
    /// Galvanic skin response (electrodermal conductance)
    SkinConductance,
    /// Skin temperature
    Temperature,
}

impl ChannelKind {
    pub const COUNT: usize = 4;

    /// Subscription order used by the handshake
    pub const ALL: [ChannelKind; Self::COUNT] = [
        ChannelKind::Acceleration,
        ChannelKind::BloodVolumePulse,
        ChannelKind::SkinConductance,
        ChannelKind::Temperature,
    ];

    pub fn index(self) -> usize {
        match self {
            ChannelKind::Acceleration => 0,
            ChannelKind::BloodVolumePulse => 1,
            ChannelKind::SkinConductance => 2,
            ChannelKind::Temperature => 3,
        }
    }

    pub fn descriptor(self) -> &'static ChannelDescriptor {
        &DESCRIPTORS[self.index()]
    }

    /// Look up the kind carried by a wire tag such as `E4_Acc`
    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|d| d.wire_tag == tag)
            .map(|d| d.kind)
    }
}

/// Static metadata for one sensor kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub kind: ChannelKind,
    /// Leading token of data lines, e.g. `E4_Bvp`
    pub wire_tag: &'static str,
    /// Argument of `device_subscribe`, e.g. `bvp`
    pub subscription: &'static str,
    /// Output channel category, also the stem of its name
    pub category: &'static str,
    /// Stem of the output channel's unique id
    pub id_prefix: &'static str,
    pub channel_count: usize,
    /// Nominal sample rate in Hz
    pub nominal_rate: f64,
    pub element_type: ElementType,
}

impl ChannelDescriptor {
    /// Output channel name for a bridge instance, e.g. `acc_left`
    pub fn stream_name(&self, instance: &str) -> String {
        format!("{}_{}", self.category, instance)
    }

    /// Output channel unique id for a bridge instance, e.g. `ACC-e4_left`
    pub fn source_id(&self, instance: &str) -> String {
        format!("{}_{}", self.id_prefix, instance)
    }
}

pub static DESCRIPTORS: [ChannelDescriptor; ChannelKind::COUNT] = [
    ChannelDescriptor {
        kind: ChannelKind::Acceleration,
        wire_tag: "E4_Acc",
        subscription: "acc",
        category: "acc",
        id_prefix: "ACC-e4",
        channel_count: 3,
        nominal_rate: 32.0,
        element_type: ElementType::Int32,
    },
    ChannelDescriptor {
        kind: ChannelKind::BloodVolumePulse,
        wire_tag: "E4_Bvp",
        subscription: "bvp",
        category: "bvp",
        id_prefix: "BVP-e4",
        channel_count: 1,
        nominal_rate: 64.0,
        element_type: ElementType::Float32,
    },
    ChannelDescriptor {
        kind: ChannelKind::SkinConductance,
        wire_tag: "E4_Gsr",
        subscription: "gsr",
        category: "gsr",
        id_prefix: "GSR-e4",
        channel_count: 1,
        nominal_rate: 4.0,
        element_type: ElementType::Float32,
    },
    ChannelDescriptor {
        kind: ChannelKind::Temperature,
        wire_tag: "E4_Temperature",
        subscription: "tmp",
        category: "tmp",
        id_prefix: "Tmp-e4",
        channel_count: 1,
        nominal_rate: 4.0,
        element_type: ElementType::Float32,
    },
];

/// Values of one sample, typed after the descriptor's element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValues {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl SampleValues {
    pub fn len(&self) -> usize {
        match self {
            SampleValues::Int(v) => v.len(),
            SampleValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            SampleValues::Int(_) => ElementType::Int32,
            SampleValues::Float(_) => ElementType::Float32,
        }
    }
}

/// One decoded reading for one channel kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub kind: ChannelKind,
    /// Device-side timestamp token, if it parsed as a number
    pub device_timestamp: Option<f64>,
    pub values: SampleValues,
}

impl Sample {
    /// Whether the sample matches its descriptor's shape and element type
    pub fn conforms(&self) -> bool {
        let descriptor = self.kind.descriptor();
        self.values.len() == descriptor.channel_count
            && self.values.element_type() == descriptor.element_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_is_indexed_by_kind() {
        for kind in ChannelKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
    }

    #[test]
    fn test_wire_tag_lookup() {
        assert_eq!(
            ChannelKind::from_wire_tag("E4_Acc"),
            Some(ChannelKind::Acceleration)
        );
        assert_eq!(
            ChannelKind::from_wire_tag("E4_Temperature"),
            Some(ChannelKind::Temperature)
        );
        assert_eq!(ChannelKind::from_wire_tag("E4_Battery"), None);
        assert_eq!(ChannelKind::from_wire_tag("e4_acc"), None);
    }

    #[test]
    fn test_channel_identity_includes_instance() {
        let acc = ChannelKind::Acceleration.descriptor();
        assert_eq!(acc.stream_name("left"), "acc_left");
        assert_eq!(acc.source_id("left"), "ACC-e4_left");

        let tmp = ChannelKind::Temperature.descriptor();
        assert_eq!(tmp.stream_name(""), "tmp_");
        assert_eq!(tmp.source_id("wrist"), "Tmp-e4_wrist");
    }

    #[test]
    fn test_sample_conformance() {
        let good = Sample {
            kind: ChannelKind::Acceleration,
            device_timestamp: Some(1.0),
            values: SampleValues::Int(vec![1, 2, 3]),
        };
        assert!(good.conforms());

        let wrong_type = Sample {
            kind: ChannelKind::SkinConductance,
            device_timestamp: None,
            values: SampleValues::Int(vec![1]),
        };
        assert!(!wrong_type.conforms());

        let wrong_len = Sample {
            kind: ChannelKind::BloodVolumePulse,
            device_timestamp: None,
            values: SampleValues::Float(vec![0.1, 0.2]),
        };
        assert!(!wrong_len.conforms());
    }
}
