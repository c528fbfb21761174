//! Sequential assembly of batches from a record cursor.

use crate::{
    batch::{Batch, ItemMut},
    common::*,
    config::{Outputs, PipelineConfig},
    partition::{ExecutionMode, Partition},
    profiling::Timing,
    record::Record,
    store::{RecordCursor, StoreCursor},
    transform::{ElementShape, Transformer},
};

/// The progress of the assembler within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblerState {
    Idle,
    Filling { item: usize },
}

/// Fills batches with the records owned by this worker.
///
/// The element shape is inferred from the first record of the store and
/// stays fixed for the lifetime of the assembler.
#[derive(Debug)]
pub struct BatchAssembler<C> {
    cursor: RecordCursor<C>,
    transformer: Transformer,
    partition: Partition,
    mode: ExecutionMode,
    outputs: Outputs,
    batch_size: usize,
    shape: ElementShape,
    state: AssemblerState,
    sequence: u64,
}

impl<C> BatchAssembler<C>
where
    C: StoreCursor,
{
    pub fn new(cursor: C, config: &PipelineConfig) -> Result<Self> {
        let PipelineConfig {
            batch_size,
            outputs,
            partition,
            mode,
            ref transform,
            ..
        } = *config;
        let outputs = outputs.resolve()?;
        let transformer = Transformer::new(transform.clone())?;
        let cursor = RecordCursor::open(cursor)?;

        // use the first record to infer the element shape
        let offset = cursor.offset();
        let first = Record::decode(cursor.current()?).map_err(|err| err.at_offset(offset))?;
        let shape = transformer.infer_shape(&first.image)?;
        info!(
            "output data size: {},{},{},{}",
            batch_size, shape.channels, shape.height, shape.width
        );

        Ok(Self {
            cursor,
            transformer,
            partition,
            mode,
            outputs,
            batch_size: batch_size.get(),
            shape,
            state: AssemblerState::Idle,
            sequence: 0,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn element_shape(&self) -> ElementShape {
        self.shape
    }

    pub fn outputs(&self) -> Outputs {
        self.outputs
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// The logical offset of the cursor.
    pub fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Allocate a batch with the layout of this assembler.
    pub fn new_batch(&self) -> Batch {
        Batch::new(self.batch_size, self.shape, self.outputs)
    }

    /// Fill every slot of `batch`.
    ///
    /// Any failing record aborts the whole batch. The content of `batch` is
    /// unspecified after a failure.
    pub fn fill(&mut self, batch: &mut Batch) -> Result<()> {
        let result = self.fill_items(batch);
        self.state = AssemblerState::Idle;
        result
    }

    fn fill_items(&mut self, batch: &mut Batch) -> Result<()> {
        batch.reshape(self.batch_size, self.shape, self.outputs);
        batch.begin(self.sequence);
        let mut timing = Timing::new("load_batch");

        for index in 0..self.batch_size {
            self.state = AssemblerState::Filling { item: index };
            timing.start();

            while self.partition.skips(self.cursor.offset(), self.mode) {
                self.cursor.advance()?;
            }

            let offset = self.cursor.offset();
            let record =
                Record::decode(self.cursor.current()?).map_err(|err| err.at_offset(offset))?;
            timing.set_record("read");

            let ItemMut {
                data,
                label,
                roi,
                pts,
            } = batch.item_mut(index, offset);
            self.transformer.transform(&record.image, data, self.mode)?;

            if let Some(label) = label {
                *label = record.label.ok_or_else(|| missing_field("label", offset))?;
            }
            if let Some(mut roi) = roi {
                let values = record.roi.ok_or_else(|| missing_field("roi", offset))?;
                izip!(roi.iter_mut(), values.xyxy()).for_each(|(dst, src)| *dst = src);
            }
            if let Some(mut pts) = pts {
                let values = record
                    .landmarks
                    .ok_or_else(|| missing_field("landmarks", offset))?;
                izip!(pts.iter_mut(), values.to_flat()).for_each(|(dst, src)| *dst = src);
            }
            timing.set_record("transform");

            self.cursor.advance()?;
        }

        self.sequence += 1;
        timing.report();
        Ok(())
    }
}

fn missing_field(field: &str, offset: u64) -> Error {
    Error::MalformedRecord {
        offset: Some(offset),
        reason: format!("the record has no {}", field),
    }
}
