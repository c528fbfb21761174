//! The composite record format stored in the record store.

use crate::common::*;
use prost::Message as _;

/// Protocol buffer messages of stored records.
///
/// The layout is wire-compatible with the records written by the dataset
/// conversion tools.
pub mod proto {
    /// The generic image record.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Datum {
        #[prost(int32, optional, tag = "1")]
        pub channels: Option<i32>,
        #[prost(int32, optional, tag = "2")]
        pub height: Option<i32>,
        #[prost(int32, optional, tag = "3")]
        pub width: Option<i32>,
        /// Channel-major pixels, or the image file if `encoded` is set.
        #[prost(bytes = "vec", optional, tag = "4")]
        pub data: Option<Vec<u8>>,
        #[prost(int32, optional, tag = "5")]
        pub label: Option<i32>,
        #[prost(float, repeated, packed = "false", tag = "6")]
        pub float_data: Vec<f32>,
        #[prost(bool, optional, tag = "7")]
        pub encoded: Option<bool>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct BBox {
        #[prost(float, optional, tag = "1")]
        pub xmin: Option<f32>,
        #[prost(float, optional, tag = "2")]
        pub ymin: Option<f32>,
        #[prost(float, optional, tag = "3")]
        pub xmax: Option<f32>,
        #[prost(float, optional, tag = "4")]
        pub ymax: Option<f32>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct MtcnnDatum {
        #[prost(message, optional, tag = "1")]
        pub datum: Option<Datum>,
        #[prost(message, optional, tag = "2")]
        pub rois: Option<BBox>,
        #[prost(float, repeated, packed = "false", tag = "3")]
        pub pts: Vec<f32>,
    }
}

/// The pixel payload of an image record.
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    /// Channel-major 8-bit samples.
    Raw(Vec<u8>),
    /// Channel-major floating point samples.
    Float(Vec<f32>),
    /// A compressed image file, such as JPEG or PNG.
    Encoded(Vec<u8>),
}

/// The image part of a record.
///
/// The dimensions of an encoded payload are informative only. They are
/// zero if the conversion tool did not fill them.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub pixels: Pixels,
}

impl ImageRecord {
    /// Create a raw image record from channel-major samples.
    pub fn raw(channels: usize, height: usize, width: usize, samples: Vec<u8>) -> Self {
        Self {
            channels,
            height,
            width,
            pixels: Pixels::Raw(samples),
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self.pixels, Pixels::Encoded(_))
    }
}

/// A decoded training record.
///
/// Decoding keeps every available field. The batch assembler decides what is
/// copied into a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub image: ImageRecord,
    pub label: Option<i32>,
    pub roi: Option<Roi<f32>>,
    pub landmarks: Option<Landmarks<f32>>,
}

impl Record {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let proto::MtcnnDatum { datum, rois, pts } = proto::MtcnnDatum::decode(bytes)
            .map_err(|err| Error::malformed(format!("unable to parse record: {}", err)))?;
        let datum = datum.ok_or_else(|| Error::malformed("the image record is missing"))?;

        let landmarks = if pts.is_empty() {
            None
        } else {
            let landmarks = Landmarks::try_from_flat(&pts)
                .ok_or(Error::LandmarkArity { found: pts.len() })?;
            Some(landmarks)
        };

        let roi = rois.map(|bbox| {
            let proto::BBox {
                xmin,
                ymin,
                xmax,
                ymax,
            } = bbox;
            Roi::from_xyxy([
                xmin.unwrap_or_default(),
                ymin.unwrap_or_default(),
                xmax.unwrap_or_default(),
                ymax.unwrap_or_default(),
            ])
        });

        let label = datum.label;
        let image = ImageRecord::from_proto(datum)?;

        Ok(Self {
            image,
            label,
            roi,
            landmarks,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let Self {
            ref image,
            label,
            roi,
            landmarks,
        } = *self;

        let mut datum = image.to_proto();
        datum.label = label;

        let rois = roi.map(|roi| {
            let [xmin, ymin, xmax, ymax] = roi.xyxy();
            proto::BBox {
                xmin: Some(xmin),
                ymin: Some(ymin),
                xmax: Some(xmax),
                ymax: Some(ymax),
            }
        });
        let pts = landmarks
            .map(|landmarks| landmarks.to_flat().to_vec())
            .unwrap_or_default();

        proto::MtcnnDatum {
            datum: Some(datum),
            rois,
            pts,
        }
        .encode_to_vec()
    }
}

impl ImageRecord {
    fn from_proto(datum: proto::Datum) -> Result<Self> {
        let proto::Datum {
            channels,
            height,
            width,
            data,
            float_data,
            encoded,
            ..
        } = datum;

        let dim = |name: &str, value: Option<i32>| -> Result<usize> {
            let value = value.unwrap_or_default();
            usize::try_from(value)
                .map_err(|_| Error::malformed(format!("negative image {} {}", name, value)))
        };
        let channels = dim("channels", channels)?;
        let height = dim("height", height)?;
        let width = dim("width", width)?;

        let pixels = match (encoded.unwrap_or(false), data) {
            (true, Some(data)) if !data.is_empty() => Pixels::Encoded(data),
            (true, _) => return Err(Error::malformed("the encoded image payload is empty")),
            (false, Some(data)) if !data.is_empty() => Pixels::Raw(data),
            (false, _) if !float_data.is_empty() => Pixels::Float(float_data),
            (false, _) => return Err(Error::malformed("the image record has no pixel data")),
        };

        Ok(Self {
            channels,
            height,
            width,
            pixels,
        })
    }

    fn to_proto(&self) -> proto::Datum {
        let (data, float_data, encoded) = match &self.pixels {
            Pixels::Raw(samples) => (Some(samples.clone()), vec![], false),
            Pixels::Float(samples) => (None, samples.clone(), false),
            Pixels::Encoded(bytes) => (Some(bytes.clone()), vec![], true),
        };

        proto::Datum {
            channels: Some(self.channels as i32),
            height: Some(self.height as i32),
            width: Some(self.width as i32),
            data,
            label: None,
            float_data,
            encoded: Some(encoded),
        }
    }
}
