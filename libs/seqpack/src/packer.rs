//! Routes stream packets into a [`FeatureStore`] and finishes the build.

use std::collections::HashMap;

use tracing::{debug, info, trace};

use crate::{
    Error, Record,
    config::PackConfig,
    detection::{Decomposer, Dimensions, MaskEncoder, RawMaskEncoder, UnsupportedDetectionPolicy},
    key::{FeatureKey, FeatureKind, StreamSpec},
    presence,
    reconcile::reconcile_annotations,
    record::{FORWARD_FLOW_PREFIX, IMAGE_HEIGHT, IMAGE_WIDTH, dimension_key},
    store::FeatureStore,
    value::{ContextValue, Detection, EncodedFrame, FeatureValue, Packet, PacketValue},
};

/// Builds one record. Construct per clip, feed packets in time order, then
/// call [`SequencePacker::finish`] exactly once.
pub struct SequencePacker<E = RawMaskEncoder> {
    streams: Vec<StreamSpec>,
    by_tag: HashMap<String, usize>,
    store: FeatureStore,
    encoder: E,
    require_all: bool,
    reconcile: bool,
    on_unsupported: UnsupportedDetectionPolicy,
    packets: usize,
}

impl SequencePacker<RawMaskEncoder> {
    pub fn new(config: &PackConfig) -> Result<Self, Error> {
        Self::with_encoder(config, None, RawMaskEncoder)
    }

    /// Extends (or, in replace mode, overwrites) an existing record.
    pub fn with_record(config: &PackConfig, record: Record) -> Result<Self, Error> {
        Self::with_encoder(config, Some(record), RawMaskEncoder)
    }
}

impl<E: MaskEncoder> SequencePacker<E> {
    pub fn with_encoder(
        config: &PackConfig,
        seed: Option<Record>,
        encoder: E,
    ) -> Result<Self, Error> {
        let replace = config.replace_instead_of_append;
        let mut store = match seed {
            Some(record) => FeatureStore::from_record(record, replace),
            None => FeatureStore::new(replace),
        };

        let mut streams = Vec::with_capacity(config.streams.len());
        let mut by_tag = HashMap::with_capacity(config.streams.len());
        for tag in &config.streams {
            let spec: StreamSpec = tag.parse()?;
            if by_tag.insert(tag.clone(), streams.len()).is_none() {
                streams.push(spec);
            }
        }

        if replace {
            for key in streams.iter().flat_map(StreamSpec::feature_keys) {
                store.clear(&key);
            }
        }
        for (key, value) in &config.context {
            store.set_context(key.clone(), ContextValue::from(value.clone()))?;
        }

        debug!(
            streams = streams.len(),
            replace,
            require_all = config.require_all_configured_streams,
            "packer ready"
        );
        Ok(Self {
            streams,
            by_tag,
            store,
            encoder,
            require_all: config.require_all_configured_streams,
            reconcile: config.reconcile_annotations,
            on_unsupported: config.on_unsupported_detection,
            packets: 0,
        })
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    /// Ingests one packet from a configured stream.
    pub fn process(&mut self, packet: Packet) -> Result<(), Error> {
        let Some(&index) = self.by_tag.get(&packet.stream) else {
            return Err(Error::UnknownStream(packet.stream));
        };
        let spec = self.streams[index].clone();
        self.ingest(&spec, packet.timestamp, packet.value)
    }

    pub fn ingest(
        &mut self,
        spec: &StreamSpec,
        timestamp: i64,
        value: PacketValue,
    ) -> Result<(), Error> {
        trace!(stream = %spec, timestamp, "packet");
        self.packets += 1;
        match (spec, value) {
            (StreamSpec::Image { prefix }, PacketValue::Frame(frame)) => {
                let key = FeatureKey::new(FeatureKind::Image, prefix.clone());
                self.ingest_frame(key, prefix.as_deref(), timestamp, frame)
            }
            (StreamSpec::ForwardFlow, PacketValue::Frame(frame)) => self.ingest_frame(
                FeatureKey::forward_flow(),
                Some(FORWARD_FLOW_PREFIX),
                timestamp,
                frame,
            ),
            (StreamSpec::FloatFeature { name }, PacketValue::Floats(values)) => self.store.append(
                &FeatureKey::float_feature(name.clone()),
                timestamp,
                FeatureValue::Floats(values),
            ),
            (StreamSpec::BBox { prefix }, PacketValue::Detections(detections)) => {
                self.ingest_detections(spec, prefix.as_deref(), timestamp, &detections, true, false)
            }
            (StreamSpec::ClassSegmentation { prefix }, PacketValue::Detections(detections)) => {
                self.ingest_detections(spec, prefix.as_deref(), timestamp, &detections, false, true)
            }
            (StreamSpec::Detections { prefix }, PacketValue::Detections(detections)) => {
                self.ingest_detections(spec, prefix.as_deref(), timestamp, &detections, true, true)
            }
            (spec, value) => Err(Error::UnexpectedPayload {
                stream: spec.to_string(),
                expected: expected_shape(spec),
                got: value.shape(),
            }),
        }
    }

    /// Validates, reconciles and emits the record.
    pub fn finish(mut self) -> Result<Record, Error> {
        let report = presence::check(&self.store, &self.streams, self.require_all)?;
        if self.reconcile {
            reconcile_annotations(&mut self.store);
        }
        let record = Record::from(self.store);
        info!(
            packets = self.packets,
            features = record.features().count(),
            missing = report.missing.len(),
            "packed record"
        );
        Ok(record)
    }

    fn ingest_frame(
        &mut self,
        key: FeatureKey,
        prefix: Option<&str>,
        timestamp: i64,
        frame: EncodedFrame,
    ) -> Result<(), Error> {
        if let (Some(width), Some(height)) = (frame.width, frame.height) {
            self.record_dimensions(prefix, i64::from(width), i64::from(height))?;
        }
        self.store
            .append(&key, timestamp, FeatureValue::Bytes(frame.encoded))
    }

    fn record_dimensions(
        &mut self,
        prefix: Option<&str>,
        width: i64,
        height: i64,
    ) -> Result<(), Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        for (base, value) in [(IMAGE_WIDTH, width), (IMAGE_HEIGHT, height)] {
            let key = dimension_key(prefix, base);
            let value = ContextValue::Int(value);
            if self.store.get_context(&key) != Some(&value) {
                self.store.set_context(key, value)?;
            }
        }
        Ok(())
    }

    fn dimensions(&self) -> Option<Dimensions> {
        let width = self.store.get_context(IMAGE_WIDTH)?.as_int()?;
        let height = self.store.get_context(IMAGE_HEIGHT)?.as_int()?;
        (width > 0 && height > 0).then_some(Dimensions { width, height })
    }

    fn ingest_detections(
        &mut self,
        spec: &StreamSpec,
        prefix: Option<&str>,
        timestamp: i64,
        detections: &[Detection],
        keep_boxes: bool,
        keep_masks: bool,
    ) -> Result<(), Error> {
        let stream = spec.to_string();
        let decomposer = Decomposer {
            stream: &stream,
            dimensions: self.dimensions(),
            encoder: &self.encoder,
            policy: self.on_unsupported,
            keep_boxes,
            keep_masks,
        };
        let decomposition = decomposer.decompose(timestamp, detections)?;

        if !decomposition.boxes.is_empty() {
            self.store.append(
                &FeatureKey::bbox(prefix),
                timestamp,
                FeatureValue::Boxes(decomposition.boxes),
            )?;
        }
        let mask_key = FeatureKey::class_segmentation(prefix);
        for mask in decomposition.masks {
            self.store
                .append(&mask_key, timestamp, FeatureValue::Bytes(mask.encoded))?;
            if let Some(label) = &mask.label {
                self.store.add_class_label(&mask_key, label);
            }
        }
        Ok(())
    }
}

fn expected_shape(spec: &StreamSpec) -> &'static str {
    match spec {
        StreamSpec::Image { .. } | StreamSpec::ForwardFlow => "encoded frame",
        StreamSpec::FloatFeature { .. } => "float vector",
        StreamSpec::BBox { .. }
        | StreamSpec::ClassSegmentation { .. }
        | StreamSpec::Detections { .. } => "detection list",
    }
}

/// Runs a whole build: setup, every packet in order, then finish.
pub fn pack(
    config: &PackConfig,
    seed: Option<Record>,
    packets: impl IntoIterator<Item = Packet>,
) -> Result<Record, Error> {
    let mut packer = SequencePacker::with_encoder(config, seed, RawMaskEncoder)?;
    for packet in packets {
        packer.process(packet)?;
    }
    packer.finish()
}
