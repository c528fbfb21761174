//! Run configuration format.

use crate::{common::*, partition::ExecutionMode, partition::Partition, transform::TransformConfig};

pub use outputs::*;
pub use pipeline::*;
pub use store::*;

/// The main run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json5(&text)
    }

    pub fn from_json5(text: &str) -> Result<Self> {
        let config: Self = json5::from_str(text)?;
        config.pipeline.outputs.resolve()?;
        Ok(config)
    }
}

mod store {
    use super::*;

    /// Record store options.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "backend", rename_all = "snake_case")]
    pub enum StoreConfig {
        /// An LMDB environment directory.
        Lmdb { source: PathBuf },
    }
}

mod pipeline {
    use super::*;

    /// Batch production options.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PipelineConfig {
        /// The number of items per batch.
        pub batch_size: NonZeroUsize,
        /// The number of batches produced ahead of consumption.
        #[serde(default = "default_prefetch_depth")]
        pub prefetch_depth: NonZeroUsize,
        #[serde(default)]
        pub outputs: OutputConfig,
        #[serde(default)]
        pub partition: Partition,
        #[serde(default)]
        pub mode: ExecutionMode,
        #[serde(default)]
        pub transform: TransformConfig,
    }

    impl PipelineConfig {
        /// Create a single-worker training configuration with default options.
        pub fn with_batch_size(batch_size: NonZeroUsize) -> Self {
            Self {
                batch_size,
                prefetch_depth: default_prefetch_depth(),
                outputs: OutputConfig::default(),
                partition: Partition::single(),
                mode: ExecutionMode::Train,
                transform: TransformConfig::default(),
            }
        }
    }

    fn default_prefetch_depth() -> NonZeroUsize {
        NonZeroUsize::new(4).unwrap()
    }
}

mod outputs {
    use super::*;

    /// Selection of the optional batch outputs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(default)]
    pub struct OutputConfig {
        pub emit_label: bool,
        pub emit_roi: bool,
        /// Landmarks are emitted together with regions of interest only.
        pub emit_landmarks: bool,
    }

    impl Default for OutputConfig {
        fn default() -> Self {
            Self {
                emit_label: true,
                emit_roi: false,
                emit_landmarks: false,
            }
        }
    }

    impl OutputConfig {
        pub fn resolve(&self) -> Result<Outputs> {
            let Self {
                emit_label,
                emit_roi,
                emit_landmarks,
            } = *self;

            let annotation = match (emit_roi, emit_landmarks) {
                (false, false) => Annotation::None,
                (true, false) => Annotation::Roi,
                (true, true) => Annotation::RoiAndLandmarks,
                (false, true) => {
                    return Err(Error::config(
                        "emit_landmarks requires emit_roi to be enabled",
                    ))
                }
            };

            Ok(Outputs {
                label: emit_label,
                annotation,
            })
        }
    }

    /// The annotation outputs of a batch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Annotation {
        None,
        Roi,
        RoiAndLandmarks,
    }

    /// The resolved set of batch outputs. The image data is always emitted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Outputs {
        pub label: bool,
        pub annotation: Annotation,
    }

    impl Outputs {
        pub fn data_only() -> Self {
            Self {
                label: false,
                annotation: Annotation::None,
            }
        }

        pub fn roi(&self) -> bool {
            matches!(
                self.annotation,
                Annotation::Roi | Annotation::RoiAndLandmarks
            )
        }

        pub fn landmarks(&self) -> bool {
            self.annotation == Annotation::RoiAndLandmarks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmarks_require_roi() {
        let config = OutputConfig {
            emit_label: true,
            emit_roi: false,
            emit_landmarks: true,
        };
        assert!(matches!(config.resolve(), Err(Error::Configuration(_))));

        let outputs = OutputConfig {
            emit_roi: true,
            ..config
        }
        .resolve()
        .unwrap();
        assert!(outputs.label && outputs.roi() && outputs.landmarks());
    }

    #[test]
    fn parse_config_with_defaults() {
        let config = Config::from_json5(
            r#"{
                store: { backend: "lmdb", source: "data/train_lmdb" },
                pipeline: { batch_size: 64 },
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Lmdb {
                source: "data/train_lmdb".into()
            }
        );
        assert_eq!(
            config.pipeline,
            PipelineConfig::with_batch_size(NonZeroUsize::new(64).unwrap())
        );
    }

    #[test]
    fn reject_invalid_config() {
        let landmarks_only = r#"{
            store: { backend: "lmdb", source: "db" },
            pipeline: { batch_size: 4, outputs: { emit_landmarks: true } },
        }"#;
        assert!(matches!(
            Config::from_json5(landmarks_only),
            Err(Error::Configuration(_))
        ));

        let zero_batch = r#"{
            store: { backend: "lmdb", source: "db" },
            pipeline: { batch_size: 0 },
        }"#;
        assert!(matches!(
            Config::from_json5(zero_batch),
            Err(Error::Config(_))
        ));
    }
}
