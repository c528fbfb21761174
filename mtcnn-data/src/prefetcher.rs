//! Double-buffered background batch production.

use crate::{
    assembler::BatchAssembler,
    batch::Batch,
    common::*,
    config::{Config, Outputs, PipelineConfig, StoreConfig},
    store::{LmdbCursor, StoreCursor},
    transform::ElementShape,
};
use flume::{Receiver, Selector, Sender, TrySendError};

/// Counters shared by the producer and the consumer.
#[derive(Debug, Default)]
pub struct PrefetchStats {
    batches: AtomicU64,
    offset: AtomicU64,
}

impl PrefetchStats {
    /// The number of completed batches.
    pub fn batches(&self) -> u64 {
        self.batches.load(atomic::Ordering::SeqCst)
    }

    /// The logical cursor offset after the last completed batch.
    pub fn offset(&self) -> u64 {
        self.offset.load(atomic::Ordering::SeqCst)
    }
}

/// Produces batches on a background thread ahead of consumption.
///
/// It owns a fixed pool of `prefetch_depth` batch buffers. The producer takes
/// a free buffer, fills it and enqueues it. Consumers take ready batches with
/// [`next_batch`] and give buffers back with [`release`]. The producer waits
/// when no buffer is free, so it never runs more than `prefetch_depth`
/// batches ahead.
///
/// [`next_batch`]: Prefetcher::next_batch
/// [`release`]: Prefetcher::release
#[derive(Debug)]
pub struct Prefetcher {
    ready_rx: Receiver<Result<Batch>>,
    free_tx: Sender<Batch>,
    cancelled: Arc<AtomicBool>,
    cancel_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<PrefetchStats>,
    batch_size: usize,
    element_shape: ElementShape,
    outputs: Outputs,
}

impl Prefetcher {
    /// Open the configured record store and start prefetching.
    pub fn new(config: &Config) -> Result<Self> {
        match &config.store {
            StoreConfig::Lmdb { source } => {
                let cursor = LmdbCursor::open(source)?;
                Self::with_cursor(cursor, &config.pipeline)
            }
        }
    }

    /// Start prefetching from an arbitrary store cursor.
    ///
    /// Configuration errors and failures on the first record are reported
    /// here rather than by [`Prefetcher::next_batch`].
    pub fn with_cursor<C>(cursor: C, config: &PipelineConfig) -> Result<Self>
    where
        C: 'static + StoreCursor,
    {
        let assembler = BatchAssembler::new(cursor, config)?;
        let depth = config.prefetch_depth.get();
        let batch_size = assembler.batch_size();
        let element_shape = assembler.element_shape();
        let outputs = assembler.outputs();

        let (ready_tx, ready_rx) = flume::bounded(depth);
        let (free_tx, free_rx) = flume::bounded(depth);
        let (cancel_tx, cancel_rx) = flume::bounded(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PrefetchStats::default());

        for _ in 0..depth {
            free_tx
                .try_send(assembler.new_batch())
                .map_err(|_| Error::Disconnected)?;
        }

        let producer = Producer {
            assembler,
            ready_tx,
            free_rx,
            cancel_rx,
            cancelled: cancelled.clone(),
            stats: stats.clone(),
        };
        let worker = thread::Builder::new()
            .name("mtcnn-prefetch".into())
            .spawn(move || producer.run())
            .map_err(Error::Spawn)?;

        info!(
            "prefetching up to {} batches of {} items in shape {}",
            depth, batch_size, element_shape
        );

        Ok(Self {
            ready_rx,
            free_tx,
            cancelled,
            cancel_tx: Some(cancel_tx),
            worker: Some(worker),
            stats,
            batch_size,
            element_shape,
            outputs,
        })
    }

    /// Take the next batch, waiting until one is ready.
    ///
    /// A failure of the producer is returned once. Later calls return
    /// [`Error::Disconnected`].
    pub fn next_batch(&self) -> Result<Batch> {
        self.ready_rx.recv().map_err(|_| Error::Disconnected)?
    }

    pub async fn next_batch_async(&self) -> Result<Batch> {
        self.ready_rx
            .recv_async()
            .await
            .map_err(|_| Error::Disconnected)?
    }

    /// Give a consumed batch back to the free pool.
    pub fn release(&self, batch: Batch) {
        match self.free_tx.try_send(batch) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("the free batch pool is full, dropping a batch that does not belong to it");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("the producer is stopped, dropping a released batch");
            }
        }
    }

    /// The number of batches waiting for consumption.
    pub fn ready_len(&self) -> usize {
        self.ready_rx.len()
    }

    pub fn stats(&self) -> &PrefetchStats {
        &self.stats
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn element_shape(&self) -> ElementShape {
        self.element_shape
    }

    pub fn outputs(&self) -> Outputs {
        self.outputs
    }

    /// Stop the producer and wait for it to exit.
    ///
    /// The store is closed when this returns.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.cancelled.store(true, atomic::Ordering::SeqCst);
        // dropping the sender wakes a producer waiting on either queue
        self.cancel_tx.take();

        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| Error::WorkerPanicked)?;
            debug!("prefetching thread joined");
        }
        Ok(())
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("failed to stop the prefetcher: {}", err);
        }
    }
}

struct Producer<C> {
    assembler: BatchAssembler<C>,
    ready_tx: Sender<Result<Batch>>,
    free_rx: Receiver<Batch>,
    cancel_rx: Receiver<()>,
    cancelled: Arc<AtomicBool>,
    stats: Arc<PrefetchStats>,
}

impl<C> Producer<C>
where
    C: StoreCursor,
{
    fn run(mut self) {
        loop {
            if self.is_cancelled() {
                break;
            }

            let batch = Selector::new()
                .recv(&self.free_rx, |result| result.ok())
                .recv(&self.cancel_rx, |_| None)
                .wait();
            let mut batch = match batch {
                Some(batch) if !self.is_cancelled() => batch,
                _ => break,
            };

            match self.assembler.fill(&mut batch) {
                Ok(()) => {
                    self.stats
                        .offset
                        .store(self.assembler.offset(), atomic::Ordering::SeqCst);
                    self.stats.batches.fetch_add(1, atomic::Ordering::SeqCst);

                    if !self.deliver(Ok(batch)) {
                        break;
                    }
                }
                Err(err) => {
                    error!("failed to produce a batch: {}", err);
                    self.deliver(Err(err));
                    break;
                }
            }
        }

        debug!(
            "prefetching thread stopped at offset {}",
            self.assembler.offset()
        );
    }

    /// Enqueue a produced item, waiting for room in the ready queue.
    ///
    /// It returns false if the consumer is gone or the prefetcher is
    /// cancelled while waiting.
    fn deliver(&self, item: Result<Batch>) -> bool {
        let delivered = Selector::new()
            .send(&self.ready_tx, item, |result| result.is_ok())
            .recv(&self.cancel_rx, |_| false)
            .wait();
        delivered && !self.is_cancelled()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(atomic::Ordering::SeqCst)
    }
}
