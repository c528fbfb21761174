//! Image decoding and per-element transformation.

use crate::{
    common::*,
    error::Shape3,
    partition::ExecutionMode,
    record::{ImageRecord, Pixels},
};
use std::borrow::Cow;

/// Image transformation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// The side length of the square crop. Zero disables cropping.
    pub crop_size: usize,
    /// The probability to mirror an image horizontally.
    pub mirror_prob: f64,
    /// The factor multiplied after mean subtraction.
    pub scale: f32,
    /// Per-channel mean values, or a single value for all channels.
    pub mean_values: Vec<f32>,
    /// Decode encoded images into 3 channels.
    pub force_color: bool,
    /// Decode encoded images into 1 channel.
    pub force_gray: bool,
    /// The seed of random cropping and mirroring.
    pub seed: Option<u64>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            crop_size: 0,
            mirror_prob: 0.0,
            scale: 1.0,
            mean_values: vec![],
            force_color: false,
            force_gray: false,
            seed: None,
        }
    }
}

/// The shape of one batch element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ElementShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    pub fn dim(&self) -> Shape3 {
        (self.channels, self.height, self.width)
    }

    /// The number of scalars of an element.
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Shape3> for ElementShape {
    fn from((channels, height, width): Shape3) -> Self {
        Self::new(channels, height, width)
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// Converts image records into normalized channel-major tensors.
#[derive(Debug)]
pub struct Transformer {
    config: TransformConfig,
    rng: StdRng,
}

impl Transformer {
    pub fn new(config: TransformConfig) -> Result<Self> {
        let TransformConfig {
            mirror_prob,
            scale,
            force_color,
            force_gray,
            seed,
            ..
        } = config;

        if !(0.0..=1.0).contains(&mirror_prob) {
            return Err(Error::config(format!(
                "mirror_prob must be in range [0, 1], but get {}",
                mirror_prob
            )));
        }
        if !scale.is_finite() {
            return Err(Error::config("scale must be finite"));
        }
        if force_color && force_gray {
            return Err(Error::config(
                "force_color and force_gray cannot be both enabled",
            ));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Infer the output element shape of an image.
    ///
    /// Encoded payloads are decoded to read their dimensions.
    pub fn infer_shape(&self, image: &ImageRecord) -> Result<ElementShape> {
        let decoded = self.decode(image)?;
        let crop_size = self.config.crop_size;
        self.check_crop(&decoded)?;

        let n_means = self.config.mean_values.len();
        if n_means > 1 && n_means != decoded.channels {
            return Err(Error::config(format!(
                "expect 1 or {} mean values, but get {}",
                decoded.channels, n_means
            )));
        }

        Ok(decoded.output_shape(crop_size))
    }

    /// Decode an image and write the transformed pixels into `dest`.
    ///
    /// `dest` must have exactly the output element shape of the image.
    pub fn transform(
        &mut self,
        image: &ImageRecord,
        mut dest: ArrayViewMut3<'_, f32>,
        mode: ExecutionMode,
    ) -> Result<()> {
        let decoded = self.decode(image)?;
        let expect = dest.dim();
        let crop_size = self.config.crop_size;
        self.check_crop(&decoded)?;

        let found = decoded.output_shape(crop_size).dim();
        if found != expect {
            return Err(Error::ShapeMismatch { expect, found });
        }

        let (channels, out_height, out_width) = expect;
        let Decoded { height, width, .. } = decoded;

        let (h_off, w_off) = match (crop_size, mode) {
            (0, _) => (0, 0),
            (_, ExecutionMode::Train) => (
                self.rng.gen_range(0..=(height - crop_size)),
                self.rng.gen_range(0..=(width - crop_size)),
            ),
            (_, ExecutionMode::Eval) => ((height - crop_size) / 2, (width - crop_size) / 2),
        };
        let mirror = self.config.mirror_prob > 0.0 && self.rng.gen_bool(self.config.mirror_prob);
        let scale = self.config.scale;

        for c in 0..channels {
            let mean = self.mean_of(c);
            for y in 0..out_height {
                let row = (c * height + h_off + y) * width + w_off;
                for x in 0..out_width {
                    let pixel = decoded.samples.get(row + x);
                    let out_x = if mirror { out_width - 1 - x } else { x };
                    dest[[c, y, out_x]] = (pixel - mean) * scale;
                }
            }
        }

        Ok(())
    }

    fn check_crop(&self, decoded: &Decoded<'_>) -> Result<()> {
        let crop_size = self.config.crop_size;
        if crop_size > decoded.height || crop_size > decoded.width {
            return Err(Error::config(format!(
                "crop_size {} exceeds the image size {}x{}",
                crop_size, decoded.height, decoded.width
            )));
        }
        Ok(())
    }

    fn mean_of(&self, channel: usize) -> f32 {
        match self.config.mean_values.as_slice() {
            [] => 0.0,
            [value] => *value,
            values => values.get(channel).copied().unwrap_or_default(),
        }
    }

    fn decode<'a>(&self, image: &'a ImageRecord) -> Result<Decoded<'a>> {
        let ImageRecord {
            channels,
            height,
            width,
            ref pixels,
        } = *image;

        let check_len = |len: usize| {
            let expect = channels * height * width;
            if len == expect {
                Ok(())
            } else {
                Err(Error::decode(format!(
                    "expect {} samples for a {}x{}x{} image, but found {}",
                    expect, channels, height, width, len
                )))
            }
        };

        let decoded = match pixels {
            Pixels::Raw(samples) => {
                check_len(samples.len())?;
                Decoded {
                    channels,
                    height,
                    width,
                    samples: Samples::U8(Cow::Borrowed(samples)),
                }
            }
            Pixels::Float(samples) => {
                check_len(samples.len())?;
                Decoded {
                    channels,
                    height,
                    width,
                    samples: Samples::F32(samples),
                }
            }
            Pixels::Encoded(bytes) => self.decode_encoded(bytes)?,
        };

        Ok(decoded)
    }

    /// Decode a compressed image into channel-major samples.
    ///
    /// Color images are stored in BGR channel order, the order of raw
    /// records produced by the conversion tools.
    fn decode_encoded<'a>(&self, bytes: &[u8]) -> Result<Decoded<'a>> {
        let image = image::load_from_memory(bytes).map_err(Error::decode)?;
        let height = image.height() as usize;
        let width = image.width() as usize;
        let color = if self.config.force_color {
            true
        } else if self.config.force_gray {
            false
        } else {
            image.color().has_color()
        };

        let (channels, samples) = if color {
            let hwc = image.to_rgb8().into_raw();
            let chw: Vec<u8> = (0..3)
                .flat_map(|c| {
                    let hwc = &hwc;
                    (0..height * width).map(move |pos| hwc[pos * 3 + (2 - c)])
                })
                .collect();
            (3, chw)
        } else {
            (1, image.to_luma8().into_raw())
        };

        Ok(Decoded {
            channels,
            height,
            width,
            samples: Samples::U8(Cow::Owned(samples)),
        })
    }
}

#[derive(Debug)]
struct Decoded<'a> {
    channels: usize,
    height: usize,
    width: usize,
    samples: Samples<'a>,
}

impl Decoded<'_> {
    fn output_shape(&self, crop_size: usize) -> ElementShape {
        match crop_size {
            0 => ElementShape::new(self.channels, self.height, self.width),
            size => ElementShape::new(self.channels, size, size),
        }
    }
}

#[derive(Debug)]
enum Samples<'a> {
    U8(Cow<'a, [u8]>),
    F32(&'a [f32]),
}

impl Samples<'_> {
    fn get(&self, index: usize) -> f32 {
        match self {
            Self::U8(samples) => samples[index] as f32,
            Self::F32(samples) => samples[index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use itertools::Itertools as _;
    use ndarray::Array3;

    fn ramp(channels: usize, height: usize, width: usize) -> ImageRecord {
        let len = channels * height * width;
        ImageRecord::raw(channels, height, width, (0..len).map(|v| v as u8).collect())
    }

    fn run(
        config: TransformConfig,
        image: &ImageRecord,
        mode: ExecutionMode,
    ) -> Result<Array3<f32>> {
        let mut transformer = Transformer::new(config)?;
        let shape = transformer.infer_shape(image)?;
        let mut output = Array3::zeros(shape.dim());
        transformer.transform(image, output.view_mut(), mode)?;
        Ok(output)
    }

    #[test]
    fn mean_and_scale() {
        let config = TransformConfig {
            mean_values: vec![1.0, 2.0],
            scale: 0.5,
            ..Default::default()
        };
        let output = run(config, &ramp(2, 1, 3), ExecutionMode::Train).unwrap();
        let expect: [[[f32; 3]; 1]; 2] = [[[-0.5, 0.0, 0.5]], [[0.5, 1.0, 1.5]]];

        izip!(output.iter(), expect.iter().flatten().flatten()).for_each(|(&actual, &expect)| {
            assert_abs_diff_eq!(actual, expect, epsilon = 1e-6);
        });
    }

    #[test]
    fn mirror_flips_columns() {
        let config = TransformConfig {
            mirror_prob: 1.0,
            ..Default::default()
        };
        let output = run(config, &ramp(1, 2, 3), ExecutionMode::Train).unwrap();
        assert_eq!(output.into_raw_vec(), [2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn eval_crop_is_centered() {
        let config = TransformConfig {
            crop_size: 2,
            ..Default::default()
        };
        let output = run(config, &ramp(1, 4, 4), ExecutionMode::Eval).unwrap();
        assert_eq!(output.into_raw_vec(), [5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn train_crop_is_a_window() {
        let image = ramp(1, 4, 4);
        let windows: Vec<Vec<f32>> = crop_windows(4, 2);

        for seed in 0..16 {
            let config = TransformConfig {
                crop_size: 2,
                seed: Some(seed),
                ..Default::default()
            };
            let output = run(config, &image, ExecutionMode::Train).unwrap();
            assert!(windows.contains(&output.into_raw_vec()));
        }
    }

    fn crop_windows(size: usize, crop: usize) -> Vec<Vec<f32>> {
        (0..=size - crop)
            .cartesian_product(0..=size - crop)
            .map(|(top, left)| {
                (0..crop)
                    .cartesian_product(0..crop)
                    .map(|(y, x)| ((top + y) * size + left + x) as f32)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn encoded_image_is_bgr_channel_major() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([10, 20, 30]));
        rgb.put_pixel(1, 0, Rgb([40, 50, 60]));
        let mut png = std::io::Cursor::new(vec![]);
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut png, ImageOutputFormat::Png)
            .unwrap();

        let image = ImageRecord {
            channels: 0,
            height: 0,
            width: 0,
            pixels: Pixels::Encoded(png.into_inner()),
        };
        let transformer = Transformer::new(Default::default()).unwrap();
        assert_eq!(
            transformer.infer_shape(&image).unwrap(),
            ElementShape::new(3, 1, 2)
        );

        let output = run(Default::default(), &image, ExecutionMode::Eval).unwrap();
        assert_eq!(output.into_raw_vec(), [30.0, 60.0, 20.0, 50.0, 10.0, 40.0]);

        let gray = TransformConfig {
            force_gray: true,
            ..Default::default()
        };
        let output = run(gray, &image, ExecutionMode::Eval).unwrap();
        assert_eq!(output.dim(), (1, 1, 2));
    }

    #[test]
    fn shape_mismatch_is_not_resized() {
        let mut transformer = Transformer::new(Default::default()).unwrap();
        let mut output = Array3::zeros((3, 24, 24));
        let result = transformer.transform(&ramp(3, 12, 12), output.view_mut(), ExecutionMode::Train);
        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                expect: (3, 24, 24),
                found: (3, 12, 12)
            })
        ));
    }

    #[test]
    fn cropped_shape_mismatch_reports_output_shapes() {
        let config = TransformConfig {
            crop_size: 8,
            ..Default::default()
        };
        let mut transformer = Transformer::new(config).unwrap();
        assert_eq!(
            transformer.infer_shape(&ramp(3, 24, 24)).unwrap(),
            ElementShape::new(3, 8, 8)
        );

        let mut output = Array3::zeros((3, 8, 8));
        transformer
            .transform(&ramp(3, 12, 12), output.view_mut(), ExecutionMode::Eval)
            .unwrap();

        let result = transformer.transform(&ramp(1, 12, 12), output.view_mut(), ExecutionMode::Eval);
        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                expect: (3, 8, 8),
                found: (1, 8, 8)
            })
        ));

        let result = transformer.transform(&ramp(3, 6, 6), output.view_mut(), ExecutionMode::Eval);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn undecodable_payloads() {
        let transformer = Transformer::new(Default::default()).unwrap();

        let truncated = ImageRecord::raw(3, 2, 2, vec![0; 11]);
        assert!(matches!(
            transformer.infer_shape(&truncated),
            Err(Error::DecodeError { .. })
        ));

        let garbage = ImageRecord {
            channels: 3,
            height: 2,
            width: 2,
            pixels: Pixels::Encoded(vec![1, 2, 3, 4]),
        };
        assert!(matches!(
            transformer.infer_shape(&garbage),
            Err(Error::DecodeError { .. })
        ));
    }

    #[test]
    fn invalid_transform_config() {
        let crop = Transformer::new(TransformConfig {
            crop_size: 5,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            crop.infer_shape(&ramp(1, 4, 4)),
            Err(Error::Configuration(_))
        ));

        let means = Transformer::new(TransformConfig {
            mean_values: vec![1.0, 2.0],
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            means.infer_shape(&ramp(3, 2, 2)),
            Err(Error::Configuration(_))
        ));

        assert!(Transformer::new(TransformConfig {
            mirror_prob: 1.5,
            ..Default::default()
        })
        .is_err());
        assert!(Transformer::new(TransformConfig {
            force_color: true,
            force_gray: true,
            ..Default::default()
        })
        .is_err());
    }
}
