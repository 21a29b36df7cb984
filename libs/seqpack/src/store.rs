use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    Error, Record,
    key::FeatureKey,
    value::{BoxAnnotation, ContextValue, FeatureValue},
};

/// Parallel timestamp and value lists for one feature key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSequence {
    timestamps: Vec<i64>,
    values: Vec<FeatureValue>,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn timestamp_at(&self, index: usize) -> Option<i64> {
        self.timestamps.get(index).copied()
    }

    pub fn value_at(&self, index: usize) -> Option<&FeatureValue> {
        self.values.get(index)
    }

    pub fn bytes_at(&self, index: usize) -> Option<&[u8]> {
        self.value_at(index)?.as_bytes()
    }

    pub fn floats_at(&self, index: usize) -> Option<&[f32]> {
        self.value_at(index)?.as_floats()
    }

    pub fn boxes_at(&self, index: usize) -> Option<&[BoxAnnotation]> {
        self.value_at(index)?.as_boxes()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &FeatureValue)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter())
    }

    pub(crate) fn push(&mut self, timestamp: i64, value: FeatureValue) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.timestamps.len() == self.values.len()
    }
}

impl FromIterator<(i64, FeatureValue)> for FeatureSequence {
    fn from_iter<T: IntoIterator<Item = (i64, FeatureValue)>>(iter: T) -> Self {
        let (timestamps, values) = iter.into_iter().unzip();
        Self { timestamps, values }
    }
}

/// Accumulates one record: clip-level context plus timestamped sequences.
///
/// In replace mode the first write to a key during a build discards whatever
/// the key held before (for example from a seed record); later writes append.
#[derive(Clone, Debug, Default)]
pub struct FeatureStore {
    context: BTreeMap<String, ContextValue>,
    features: BTreeMap<FeatureKey, FeatureSequence>,
    class_labels: BTreeMap<FeatureKey, Vec<String>>,
    replace: bool,
    touched: BTreeSet<FeatureKey>,
}

impl FeatureStore {
    pub fn new(replace: bool) -> Self {
        Self {
            replace,
            ..Default::default()
        }
    }

    /// Seeds a store with the contents of an existing record.
    pub fn from_record(record: Record, replace: bool) -> Self {
        let (context, features, class_labels) = record.into_parts();
        Self {
            context,
            features,
            class_labels,
            replace,
            touched: BTreeSet::new(),
        }
    }

    pub fn set_context(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Result<(), Error> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.context.get(&key) {
            if !self.replace {
                return Err(Error::DuplicateContext(key));
            }
            if existing != &value {
                warn!(%key, "overwriting context attribute");
            }
        }
        self.context.insert(key, value);
        Ok(())
    }

    pub fn get_context(&self, key: &str) -> Option<&ContextValue> {
        self.context.get(key)
    }

    pub fn context(&self) -> &BTreeMap<String, ContextValue> {
        &self.context
    }

    /// Extends the sequence for `key`. Timestamps strictly increase, except
    /// for segmentation masks, where several entries may share a timestamp.
    pub fn append(
        &mut self,
        key: &FeatureKey,
        timestamp: i64,
        value: FeatureValue,
    ) -> Result<(), Error> {
        self.touch(key);
        if let Some(sequence) = self.features.get_mut(key) {
            if let Some(last) = sequence.last_timestamp()
                && (last > timestamp
                    || (last == timestamp && !key.kind.allows_repeated_timestamps()))
            {
                return Err(Error::TimeTravel {
                    key: key.clone(),
                    last,
                    timestamp,
                });
            }
            sequence.push(timestamp, value);
        } else {
            let mut sequence = FeatureSequence::default();
            sequence.push(timestamp, value);
            self.features.insert(key.clone(), sequence);
        }
        trace!(%key, timestamp, "appended");
        Ok(())
    }

    /// Drops every entry and class label stored under `key`.
    pub fn clear(&mut self, key: &FeatureKey) {
        self.touched.insert(key.clone());
        self.features.remove(key);
        self.class_labels.remove(key);
    }

    pub fn sequence(&self, key: &FeatureKey) -> (&[i64], &[FeatureValue]) {
        match self.features.get(key) {
            Some(sequence) => (sequence.timestamps(), sequence.values()),
            None => (&[], &[]),
        }
    }

    pub fn feature(&self, key: &FeatureKey) -> Option<&FeatureSequence> {
        self.features.get(key).filter(|s| !s.is_empty())
    }

    pub fn count(&self, key: &FeatureKey) -> usize {
        self.features.get(key).map_or(0, FeatureSequence::len)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FeatureKey> + '_ {
        self.features.keys()
    }

    /// Records a segmentation class label, keeping first-seen order.
    pub fn add_class_label(&mut self, key: &FeatureKey, label: &str) {
        self.touch(key);
        let labels = self.class_labels.entry(key.clone()).or_default();
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }

    pub fn class_labels(&self, key: &FeatureKey) -> &[String] {
        self.class_labels.get(key).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn replace_sequence(&mut self, key: &FeatureKey, sequence: FeatureSequence) {
        self.features.insert(key.clone(), sequence);
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

    fn touch(&mut self, key: &FeatureKey) {
        if self.replace && !self.touched.contains(key) {
            self.clear(key);
        }
    }
}
