#![allow(dead_code)]

use bbox::{Landmarks, Roi};
use mtcnn_data::{
    record::ImageRecord,
    store::{MemoryCursor, MemoryStore, StoreCursor},
    PipelineConfig, Record, Result,
};
use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// A 3x`size`x`size` record whose pixels and label equal `label`.
pub fn record(label: i32, size: usize) -> Record {
    let value = label as f32 / 10.0;
    Record {
        image: ImageRecord::raw(3, size, size, vec![label as u8; 3 * size * size]),
        label: Some(label),
        roi: Some(Roi::from_xyxy([value, value, value + 0.5, value + 0.5])),
        landmarks: Some(Landmarks::from_flat([value; 10])),
    }
}

pub fn store_of<I>(records: I) -> MemoryStore
where
    I: IntoIterator<Item = Record>,
{
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| (format!("{:08}_face.jpg", index), record.encode()))
        .collect()
}

pub fn pipeline_config(batch_size: usize, prefetch_depth: usize) -> PipelineConfig {
    PipelineConfig {
        prefetch_depth: NonZeroUsize::new(prefetch_depth).unwrap(),
        ..PipelineConfig::with_batch_size(NonZeroUsize::new(batch_size).unwrap())
    }
}

/// A cursor that counts every store access.
#[derive(Debug)]
pub struct CountingCursor {
    inner: MemoryCursor,
    accesses: Arc<AtomicUsize>,
}

impl CountingCursor {
    pub fn new(store: &MemoryStore) -> (Self, Arc<AtomicUsize>) {
        let accesses = Arc::new(AtomicUsize::new(0));
        let cursor = Self {
            inner: store.cursor(),
            accesses: accesses.clone(),
        };
        (cursor, accesses)
    }

    fn touch(&self) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
    }
}

impl StoreCursor for CountingCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        self.touch();
        self.inner.seek_to_first()
    }

    fn next(&mut self) -> Result<()> {
        self.touch();
        self.inner.next()
    }

    fn valid(&self) -> bool {
        self.touch();
        self.inner.valid()
    }

    fn value_bytes(&self) -> Option<&[u8]> {
        self.touch();
        self.inner.value_bytes()
    }
}

/// Poll `cond` until it holds or the timeout expires.
pub fn wait_until<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let since = Instant::now();
    while since.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
