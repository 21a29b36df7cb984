//! Splits detection lists into box annotations and encoded masks.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    Error,
    value::{BoxAnnotation, BoxList, Detection, Location, MaskRaster, RelativeRect},
};

/// Turns a raster mask into the byte string stored in the record.
pub trait MaskEncoder {
    fn encode(&self, mask: &MaskRaster) -> Result<Vec<u8>, Error>;
}

/// Stores masks as postcard-encoded rasters.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawMaskEncoder;

impl MaskEncoder for RawMaskEncoder {
    fn encode(&self, mask: &MaskRaster) -> Result<Vec<u8>, Error> {
        Ok(postcard::to_allocvec(mask)?)
    }
}

impl<F> MaskEncoder for F
where
    F: Fn(&MaskRaster) -> Result<Vec<u8>, Error>,
{
    fn encode(&self, mask: &MaskRaster) -> Result<Vec<u8>, Error> {
        self(mask)
    }
}

/// What to do with a detection that is neither a box nor a mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsupportedDetectionPolicy {
    #[default]
    Skip,
    Reject,
}

/// Image size in pixels, used to normalize absolute boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: i64,
    pub height: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncodedMask {
    pub label: Option<String>,
    pub encoded: Vec<u8>,
}

/// Detections at one timestamp, partitioned by location kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decomposition {
    pub boxes: BoxList,
    pub masks: Vec<EncodedMask>,
}

pub struct Decomposer<'a, E: ?Sized> {
    pub stream: &'a str,
    pub dimensions: Option<Dimensions>,
    pub encoder: &'a E,
    pub policy: UnsupportedDetectionPolicy,
    pub keep_boxes: bool,
    pub keep_masks: bool,
}

impl<E: MaskEncoder + ?Sized> Decomposer<'_, E> {
    /// Each detection lands in at most one half of the result. Halves the
    /// stream does not keep are dropped without being converted.
    pub fn decompose(
        &self,
        timestamp: i64,
        detections: &[Detection],
    ) -> Result<Decomposition, Error> {
        let mut out = Decomposition::default();
        for detection in detections {
            let rect = match &detection.location {
                Location::Mask(mask) => {
                    if self.keep_masks {
                        out.masks.push(EncodedMask {
                            label: detection.labels.first().cloned(),
                            encoded: self.encoder.encode(mask)?,
                        });
                    } else {
                        trace!(stream = self.stream, timestamp, "dropping mask detection");
                    }
                    continue;
                }
                Location::Global => {
                    if self.policy == UnsupportedDetectionPolicy::Reject {
                        return Err(Error::UnsupportedDetection {
                            stream: self.stream.to_string(),
                            timestamp,
                        });
                    }
                    warn!(
                        stream = self.stream,
                        timestamp,
                        "skipping detection without box or mask"
                    );
                    continue;
                }
                _ if !self.keep_boxes => {
                    trace!(stream = self.stream, timestamp, "dropping box detection");
                    continue;
                }
                &Location::RelativeBoundingBox {
                    xmin,
                    ymin,
                    width,
                    height,
                } => RelativeRect {
                    xmin,
                    ymin,
                    xmax: xmin + width,
                    ymax: ymin + height,
                },
                &Location::BoundingBox {
                    xmin,
                    ymin,
                    width,
                    height,
                } => self.normalize(xmin, ymin, width, height)?,
            };
            out.boxes.push(BoxAnnotation {
                label: detection.labels.first().cloned(),
                label_index: detection.label_ids.first().copied(),
                score: detection.scores.first().copied(),
                rect,
            });
        }
        Ok(out)
    }

    fn normalize(
        &self,
        xmin: i32,
        ymin: i32,
        width: i32,
        height: i32,
    ) -> Result<RelativeRect, Error> {
        let Some(dims) = self.dimensions else {
            return Err(Error::MissingDimensions {
                stream: self.stream.to_string(),
            });
        };
        // corners summed as i64 so boxes near i32::MAX cannot overflow
        let (xmin, ymin) = (i64::from(xmin), i64::from(ymin));
        let xmax = xmin + i64::from(width);
        let ymax = ymin + i64::from(height);
        let w = dims.width as f32;
        let h = dims.height as f32;
        Ok(RelativeRect {
            xmin: xmin as f32 / w,
            ymin: ymin as f32 / h,
            xmax: xmax as f32 / w,
            ymax: ymax as f32 / h,
        })
    }
}
