//! Feature keys and stream specs.
//!
//! A [`FeatureKey`] names one timestamped sequence inside a record. A
//! [`StreamSpec`] names one configured input stream; a stream writes to one
//! or more feature keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureKind {
    Image,
    ForwardFlowEncoded,
    FloatFeature,
    BBox,
    ClassSegmentation,
}

impl FeatureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Image => "IMAGE",
            FeatureKind::ForwardFlowEncoded => "FORWARD_FLOW_ENCODED",
            FeatureKind::FloatFeature => "FLOAT_FEATURE",
            FeatureKind::BBox => "BBOX",
            FeatureKind::ClassSegmentation => "CLASS_SEGMENTATION",
        }
    }

    /// Segmentation stores one entry per mask, so masks detected in the same
    /// frame share its timestamp.
    pub fn allows_repeated_timestamps(self) -> bool {
        matches!(self, FeatureKind::ClassSegmentation)
    }
}

/// Identifies one feature sequence. `name` is the prefix for image, box and
/// segmentation features and the feature name for float features.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    pub kind: FeatureKind,
    pub name: Option<String>,
}

impl FeatureKey {
    pub fn new(kind: FeatureKind, name: Option<String>) -> Self {
        Self { kind, name }
    }

    pub fn image() -> Self {
        Self::new(FeatureKind::Image, None)
    }

    pub fn prefixed_image(prefix: impl Into<String>) -> Self {
        Self::new(FeatureKind::Image, Some(prefix.into()))
    }

    pub fn forward_flow() -> Self {
        Self::new(FeatureKind::ForwardFlowEncoded, None)
    }

    pub fn float_feature(name: impl Into<String>) -> Self {
        Self::new(FeatureKind::FloatFeature, Some(name.into()))
    }

    pub fn bbox(prefix: Option<&str>) -> Self {
        Self::new(FeatureKind::BBox, prefix.map(str::to_string))
    }

    pub fn class_segmentation(prefix: Option<&str>) -> Self {
        Self::new(FeatureKind::ClassSegmentation, prefix.map(str::to_string))
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}_{}", self.kind.as_str(), name),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// A configured input stream. The optional prefix or name is an explicit
/// field here; tags like `IMAGE_LEFT` are only parsed once at setup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamSpec {
    Image { prefix: Option<String> },
    ForwardFlow,
    FloatFeature { name: String },
    BBox { prefix: Option<String> },
    ClassSegmentation { prefix: Option<String> },
    /// Detection lists whose boxes and masks are both kept.
    Detections { prefix: Option<String> },
}

impl StreamSpec {
    pub fn parse(tag: &str) -> Result<Self, Error> {
        if tag == "FORWARD_FLOW_ENCODED" {
            return Ok(StreamSpec::ForwardFlow);
        }
        if let Some(name) = tag.strip_prefix("FLOAT_FEATURE_")
            && !name.is_empty()
        {
            return Ok(StreamSpec::FloatFeature {
                name: name.to_string(),
            });
        }
        if let Some(prefix) = split_prefix(tag, "CLASS_SEGMENTATION") {
            return Ok(StreamSpec::ClassSegmentation { prefix });
        }
        if let Some(prefix) = split_prefix(tag, "IMAGE") {
            return Ok(StreamSpec::Image { prefix });
        }
        if let Some(prefix) = split_prefix(tag, "BBOX") {
            return Ok(StreamSpec::BBox { prefix });
        }
        if let Some(prefix) = split_prefix(tag, "DETECTIONS") {
            return Ok(StreamSpec::Detections { prefix });
        }
        Err(Error::UnknownStream(tag.to_string()))
    }

    /// Every feature key this stream can write to.
    pub fn feature_keys(&self) -> SmallVec<[FeatureKey; 2]> {
        match self {
            StreamSpec::Image { prefix } => {
                smallvec![FeatureKey::new(FeatureKind::Image, prefix.clone())]
            }
            StreamSpec::ForwardFlow => smallvec![FeatureKey::forward_flow()],
            StreamSpec::FloatFeature { name } => smallvec![FeatureKey::float_feature(name.clone())],
            StreamSpec::BBox { prefix } => smallvec![FeatureKey::bbox(prefix.as_deref())],
            StreamSpec::ClassSegmentation { prefix } => {
                smallvec![FeatureKey::class_segmentation(prefix.as_deref())]
            }
            StreamSpec::Detections { prefix } => smallvec![
                FeatureKey::bbox(prefix.as_deref()),
                FeatureKey::class_segmentation(prefix.as_deref()),
            ],
        }
    }
}

impl FromStr for StreamSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamSpec::parse(s)
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, suffix) = match self {
            StreamSpec::Image { prefix } => ("IMAGE", prefix.as_deref()),
            StreamSpec::ForwardFlow => ("FORWARD_FLOW_ENCODED", None),
            StreamSpec::FloatFeature { name } => ("FLOAT_FEATURE", Some(name.as_str())),
            StreamSpec::BBox { prefix } => ("BBOX", prefix.as_deref()),
            StreamSpec::ClassSegmentation { prefix } => ("CLASS_SEGMENTATION", prefix.as_deref()),
            StreamSpec::Detections { prefix } => ("DETECTIONS", prefix.as_deref()),
        };
        match suffix {
            Some(suffix) => write!(f, "{base}_{suffix}"),
            None => f.write_str(base),
        }
    }
}

/// `BASE` -> `Some(None)`, `BASE_X` -> `Some(Some("X"))`, anything else -> `None`.
fn split_prefix(tag: &str, base: &str) -> Option<Option<String>> {
    let rest = tag.strip_prefix(base)?;
    if rest.is_empty() {
        return Some(None);
    }
    match rest.strip_prefix('_') {
        Some(prefix) if !prefix.is_empty() => Some(Some(prefix.to_string())),
        _ => None,
    }
}
