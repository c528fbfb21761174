//! Reusable batch buffers.

use crate::{
    common::*,
    config::Outputs,
    transform::ElementShape,
};
use ndarray::ArrayViewMut1;

/// One training step's worth of items in batch-major tensors.
///
/// A batch is a reusable buffer. The prefetcher fills it, hands it to the
/// consumer and expects it back through [`release`].
///
/// [`release`]: crate::prefetcher::Prefetcher::release
#[derive(Debug, Clone)]
pub struct Batch {
    sequence: u64,
    offsets: Vec<u64>,
    data: Array4<f32>,
    label: Option<Array1<i32>>,
    roi: Option<Array2<f32>>,
    pts: Option<Array2<f32>>,
}

/// Mutable views on a single batch slot.
#[derive(Debug)]
pub struct ItemMut<'a> {
    pub data: ArrayViewMut3<'a, f32>,
    pub label: Option<&'a mut i32>,
    pub roi: Option<ArrayViewMut1<'a, f32>>,
    pub pts: Option<ArrayViewMut1<'a, f32>>,
}

impl Batch {
    pub fn new(batch_size: usize, shape: ElementShape, outputs: Outputs) -> Self {
        let ElementShape {
            channels,
            height,
            width,
        } = shape;

        Self {
            sequence: 0,
            offsets: Vec::with_capacity(batch_size),
            data: Array4::zeros((batch_size, channels, height, width)),
            label: outputs.label.then(|| Array1::zeros(batch_size)),
            roi: outputs.roi().then(|| Array2::zeros((batch_size, 4))),
            pts: outputs
                .landmarks()
                .then(|| Array2::zeros((batch_size, NUM_LANDMARK_VALUES))),
        }
    }

    /// Resize the storage to the given layout.
    ///
    /// Storage is reallocated only if the batch size, the element shape or
    /// the output selection changed. It returns whether it reallocated.
    pub fn reshape(&mut self, batch_size: usize, shape: ElementShape, outputs: Outputs) -> bool {
        let unchanged = self.batch_size() == batch_size
            && self.element_shape() == shape
            && self.outputs() == outputs;

        if unchanged {
            false
        } else {
            *self = Self::new(batch_size, shape, outputs);
            true
        }
    }

    pub(crate) fn begin(&mut self, sequence: u64) {
        self.sequence = sequence;
        self.offsets.clear();
    }

    pub(crate) fn item_mut(&mut self, index: usize, offset: u64) -> ItemMut<'_> {
        self.offsets.push(offset);

        ItemMut {
            data: self.data.index_axis_mut(Axis(0), index),
            label: self.label.as_mut().map(|label| &mut label[index]),
            roi: self.roi.as_mut().map(|roi| roi.row_mut(index)),
            pts: self.pts.as_mut().map(|pts| pts.row_mut(index)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.data.dim().0
    }

    pub fn element_shape(&self) -> ElementShape {
        let (_, channels, height, width) = self.data.dim();
        ElementShape::new(channels, height, width)
    }

    pub fn outputs(&self) -> Outputs {
        use crate::config::Annotation;

        let annotation = match (self.roi.is_some(), self.pts.is_some()) {
            (true, true) => Annotation::RoiAndLandmarks,
            (true, false) => Annotation::Roi,
            _ => Annotation::None,
        };
        Outputs {
            label: self.label.is_some(),
            annotation,
        }
    }

    /// The production order of this batch, starting from zero.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The logical cursor offsets of the items in slot order.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Image data in `N×C×H×W` layout.
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn label(&self) -> Option<&Array1<i32>> {
        self.label.as_ref()
    }

    /// Regions of interest in `N×4` layout.
    pub fn roi(&self) -> Option<&Array2<f32>> {
        self.roi.as_ref()
    }

    /// Landmarks in `N×10` layout.
    pub fn pts(&self) -> Option<&Array2<f32>> {
        self.pts.as_ref()
    }
}

#[cfg(feature = "with-tch")]
pub use with_tch::*;

#[cfg(feature = "with-tch")]
mod with_tch {
    use super::*;
    use itertools::Itertools as _;
    use tch::Tensor;

    /// Batch tensors on the CPU device.
    #[derive(Debug)]
    pub struct BatchTensors {
        pub data: Tensor,
        pub label: Option<Tensor>,
        pub roi: Option<Tensor>,
        pub pts: Option<Tensor>,
    }

    impl Batch {
        pub fn to_tensors(&self) -> BatchTensors {
            let (n, c, h, w) = self.data.dim();
            let data = Tensor::of_slice(&self.data.iter().copied().collect_vec())
                .view([n as i64, c as i64, h as i64, w as i64]);
            let label = self
                .label
                .as_ref()
                .map(|label| Tensor::of_slice(&label.to_vec()));
            let matrix = |array: &Array2<f32>| {
                let (rows, cols) = array.dim();
                Tensor::of_slice(&array.iter().copied().collect_vec())
                    .view([rows as i64, cols as i64])
            };

            BatchTensors {
                data,
                label,
                roi: self.roi.as_ref().map(matrix),
                pts: self.pts.as_ref().map(matrix),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Annotation;
    use itertools::Itertools as _;

    fn all_outputs() -> Outputs {
        Outputs {
            label: true,
            annotation: Annotation::RoiAndLandmarks,
        }
    }

    #[test]
    fn batch_layout() {
        let batch = Batch::new(3, ElementShape::new(3, 12, 12), all_outputs());
        assert_eq!(batch.data().dim(), (3, 3, 12, 12));
        assert_eq!(batch.label().unwrap().dim(), 3);
        assert_eq!(batch.roi().unwrap().dim(), (3, 4));
        assert_eq!(batch.pts().unwrap().dim(), (3, 10));
        assert_eq!(batch.outputs(), all_outputs());

        let batch = Batch::new(2, ElementShape::new(1, 4, 4), Outputs::data_only());
        assert!(batch.label().is_none() && batch.roi().is_none() && batch.pts().is_none());
    }

    #[test]
    fn reshape_reuses_storage() {
        let shape = ElementShape::new(3, 12, 12);
        let mut batch = Batch::new(4, shape, all_outputs());
        let ptr = batch.data().as_ptr();

        assert!(!batch.reshape(4, shape, all_outputs()));
        assert_eq!(batch.data().as_ptr(), ptr);

        assert!(batch.reshape(4, ElementShape::new(3, 24, 24), all_outputs()));
        assert_eq!(batch.data().dim(), (4, 3, 24, 24));
        assert!(batch.reshape(2, ElementShape::new(3, 24, 24), Outputs::data_only()));
        assert!(batch.pts().is_none());
    }

    #[test]
    fn item_writes_land_in_slot() {
        let mut batch = Batch::new(2, ElementShape::new(1, 1, 2), all_outputs());
        batch.begin(5);

        for (index, offset) in [(0, 10), (1, 11)] {
            let ItemMut {
                mut data,
                label,
                roi,
                pts,
            } = batch.item_mut(index, offset);
            data.fill(index as f32 + 1.0);
            *label.unwrap() = index as i32 * 7;
            roi.unwrap().fill(0.5);
            pts.unwrap()[9] = 1.0;
        }

        assert_eq!(batch.sequence(), 5);
        assert_eq!(batch.offsets(), [10, 11]);
        assert_eq!(batch.data().iter().copied().collect_vec(), [1.0, 1.0, 2.0, 2.0]);
        assert_eq!(batch.label().unwrap().to_vec(), [0, 7]);
        assert_eq!(batch.pts().unwrap()[[1, 9]], 1.0);
    }
}
