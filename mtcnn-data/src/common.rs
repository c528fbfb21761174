pub use crate::error::{Error, Result};
pub use bbox::{Landmarks, Roi, NUM_LANDMARK_VALUES};
pub use itertools::izip;
pub use log::{debug, error, info, warn};
pub use ndarray::{Array1, Array2, Array4, ArrayViewMut3, Axis};
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    collections::BTreeMap,
    fmt,
    fmt::Debug,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        atomic::{self, AtomicBool, AtomicU64},
        Arc,
    },
    thread::{self, JoinHandle},
};
