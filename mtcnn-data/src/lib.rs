//! Double-buffered batch prefetching for MTCNN training records.
//!
//! Records are read in key order from an embedded key-value store, decoded
//! into image, label, region of interest and landmarks, transformed and
//! assembled into batch-major tensors on a background thread.

mod common;
pub mod assembler;
pub mod batch;
pub mod config;
pub mod error;
pub mod partition;
pub mod prefetcher;
pub mod profiling;
pub mod record;
pub mod store;
pub mod transform;

pub use assembler::{AssemblerState, BatchAssembler};
pub use batch::Batch;
pub use config::{Config, OutputConfig, Outputs, PipelineConfig, StoreConfig};
pub use error::{Error, Result};
pub use partition::{ExecutionMode, Partition};
pub use prefetcher::{PrefetchStats, Prefetcher};
pub use record::Record;
pub use transform::{ElementShape, TransformConfig};
