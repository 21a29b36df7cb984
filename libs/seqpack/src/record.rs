//! The packed training record.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error,
    key::{FeatureKey, FeatureKind},
    store::{FeatureSequence, FeatureStore},
    value::{BoxAnnotation, ContextValue},
};

pub const CLIP_MEDIA_ID: &str = "clip/media_id";
pub const IMAGE_WIDTH: &str = "image/width";
pub const IMAGE_HEIGHT: &str = "image/height";
pub const FORWARD_FLOW_PREFIX: &str = "FORWARD_FLOW";

/// Context key for an image dimension, e.g. `LEFT/image/width`.
pub fn dimension_key(prefix: Option<&str>, base: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{base}"),
        None => base.to_string(),
    }
}

/// One clip: context attributes and every non-empty feature sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    context: BTreeMap<String, ContextValue>,
    features: BTreeMap<FeatureKey, FeatureSequence>,
    class_labels: BTreeMap<FeatureKey, Vec<String>>,
}

impl From<FeatureStore> for Record {
    fn from(store: FeatureStore) -> Self {
        let (context, mut features, mut class_labels) = store.into_parts();
        features.retain(|_, sequence| !sequence.is_empty());
        class_labels.retain(|_, labels| !labels.is_empty());
        Record {
            context,
            features,
            class_labels,
        }
    }
}

impl Record {
    pub fn context(&self, key: &str) -> Option<&ContextValue> {
        self.context.get(key)
    }

    pub fn context_entries(&self) -> impl Iterator<Item = (&str, &ContextValue)> + '_ {
        self.context.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn feature(&self, key: &FeatureKey) -> Option<&FeatureSequence> {
        self.features.get(key)
    }

    pub fn features(&self) -> impl Iterator<Item = (&FeatureKey, &FeatureSequence)> + '_ {
        self.features.iter()
    }

    /// Entry count for `key`; zero when the key is absent.
    pub fn count(&self, key: &FeatureKey) -> usize {
        self.features.get(key).map_or(0, FeatureSequence::len)
    }

    pub fn clip_media_id(&self) -> Option<&str> {
        self.context(CLIP_MEDIA_ID)
            .and_then(ContextValue::as_bytes)
            .and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn image_width(&self) -> Option<i64> {
        self.context(IMAGE_WIDTH).and_then(ContextValue::as_int)
    }

    pub fn image_height(&self) -> Option<i64> {
        self.context(IMAGE_HEIGHT).and_then(ContextValue::as_int)
    }

    pub fn images(&self, prefix: Option<&str>) -> Option<&FeatureSequence> {
        self.feature(&FeatureKey::new(FeatureKind::Image, prefix.map(str::to_string)))
    }

    pub fn forward_flow(&self) -> Option<&FeatureSequence> {
        self.feature(&FeatureKey::forward_flow())
    }

    pub fn floats(&self, name: &str) -> Option<&FeatureSequence> {
        self.feature(&FeatureKey::float_feature(name))
    }

    pub fn boxes(&self, prefix: Option<&str>) -> Option<&FeatureSequence> {
        self.feature(&FeatureKey::bbox(prefix))
    }

    pub fn segmentation(&self, prefix: Option<&str>) -> Option<&FeatureSequence> {
        self.feature(&FeatureKey::class_segmentation(prefix))
    }

    /// Distinct segmentation class labels in first-seen order.
    pub fn class_labels(&self, prefix: Option<&str>) -> &[String] {
        self.class_labels
            .get(&FeatureKey::class_segmentation(prefix))
            .map_or(&[], Vec::as_slice)
    }

    /// Whether box entry `index` carries a real annotation rather than a
    /// reconciliation placeholder.
    pub fn is_annotated(&self, prefix: Option<&str>, index: usize) -> bool {
        self.boxes(prefix)
            .and_then(|s| s.boxes_at(index))
            .is_some_and(|b: &[BoxAnnotation]| !b.is_empty())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let record: Record = postcard::from_bytes(buf)?;
        if let Some((key, _)) = record.features.iter().find(|(_, s)| !s.is_consistent()) {
            return Err(Error::CorruptRecord(key.clone()));
        }
        Ok(record)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let buf = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&buf)?;
        debug!(?path, bytes = buf.len(), "wrote record");
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut buf = vec![];
        File::open(path)?.read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        BTreeMap<String, ContextValue>,
        BTreeMap<FeatureKey, FeatureSequence>,
        BTreeMap<FeatureKey, Vec<String>>,
    ) {
        (self.context, self.features, self.class_labels)
    }
}
