use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A clip-level attribute.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum ContextValue {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl ContextValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Self::Bytes(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let Self::Int(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        if let Self::Float(v) = self {
            Some(*v)
        } else {
            None
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Bytes(value.into_bytes())
    }
}

impl From<Vec<u8>> for ContextValue {
    fn from(value: Vec<u8>) -> Self {
        ContextValue::Bytes(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

/// Box corners as fractions of the image size.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct RelativeRect {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct BoxAnnotation {
    pub label: Option<String>,
    pub label_index: Option<i32>,
    pub score: Option<f32>,
    pub rect: RelativeRect,
}

pub type BoxList = SmallVec<[BoxAnnotation; 2]>;

/// One value of a feature sequence.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum FeatureValue {
    /// Encoded image, flow frame or mask.
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
    /// Every box annotated at one timestamp. Empty means not annotated.
    Boxes(BoxList),
}

impl FeatureValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Self::Bytes(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        if let Self::Floats(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_boxes(&self) -> Option<&[BoxAnnotation]> {
        if let Self::Boxes(v) = self {
            Some(v)
        } else {
            None
        }
    }
}

/// Output of the image encoder: an already encoded frame with the size it
/// was encoded at, when known.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct EncodedFrame {
    pub encoded: Vec<u8>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl EncodedFrame {
    pub fn new(encoded: impl Into<Vec<u8>>) -> Self {
        Self {
            encoded: encoded.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Single channel raster mask, row major.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MaskRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Location {
    /// Pixel coordinates.
    BoundingBox {
        xmin: i32,
        ymin: i32,
        width: i32,
        height: i32,
    },
    /// Fractions of the image size.
    RelativeBoundingBox {
        xmin: f32,
        ymin: f32,
        width: f32,
        height: f32,
    },
    Mask(MaskRaster),
    /// No spatial extent; covers the whole frame.
    Global,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Detection {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub label_ids: Vec<i32>,
    #[serde(default)]
    pub scores: Vec<f32>,
    pub location: Location,
}

impl Detection {
    pub fn new(location: Location) -> Self {
        Self {
            labels: vec![],
            label_ids: vec![],
            scores: vec![],
            location,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn label_id(mut self, id: i32) -> Self {
        self.label_ids.push(id);
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.scores.push(score);
        self
    }
}

/// Payload of one input packet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PacketValue {
    Frame(EncodedFrame),
    Floats(Vec<f32>),
    Detections(Vec<Detection>),
}

impl PacketValue {
    pub fn shape(&self) -> &'static str {
        match self {
            PacketValue::Frame(_) => "encoded frame",
            PacketValue::Floats(_) => "float vector",
            PacketValue::Detections(_) => "detection list",
        }
    }
}

/// A timestamped value delivered on a named stream.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Packet {
    pub stream: String,
    pub timestamp: i64,
    pub value: PacketValue,
}

impl Packet {
    pub fn new(stream: impl Into<String>, timestamp: i64, value: PacketValue) -> Self {
        Self {
            stream: stream.into(),
            timestamp,
            value,
        }
    }
}
