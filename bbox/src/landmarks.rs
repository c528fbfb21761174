/// The number of facial landmark points.
pub const NUM_LANDMARKS: usize = 5;

/// The number of scalar values of a landmark set.
pub const NUM_LANDMARK_VALUES: usize = NUM_LANDMARKS * 2;

/// Five facial landmark points stored as `(x, y)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmarks<T> {
    points: [[T; 2]; NUM_LANDMARKS],
}

impl<T> Landmarks<T>
where
    T: Copy,
{
    pub fn from_points(points: [[T; 2]; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Build landmarks from `x0, y0, x1, y1, ...` values.
    pub fn from_flat(values: [T; NUM_LANDMARK_VALUES]) -> Self {
        let mut points = [[values[0]; 2]; NUM_LANDMARKS];
        points.iter_mut().enumerate().for_each(|(index, point)| {
            *point = [values[index * 2], values[index * 2 + 1]];
        });
        Self { points }
    }

    /// Build landmarks from a slice, or `None` unless it has exactly 10 values.
    pub fn try_from_flat(values: &[T]) -> Option<Self> {
        if values.len() != NUM_LANDMARK_VALUES {
            return None;
        }
        let mut flat = [values[0]; NUM_LANDMARK_VALUES];
        flat.copy_from_slice(values);
        Some(Self::from_flat(flat))
    }

    pub fn points(&self) -> &[[T; 2]; NUM_LANDMARKS] {
        &self.points
    }

    pub fn to_flat(&self) -> [T; NUM_LANDMARK_VALUES] {
        let [x0, _] = self.points[0];
        let mut flat = [x0; NUM_LANDMARK_VALUES];
        self.points.iter().enumerate().for_each(|(index, &[x, y])| {
            flat[index * 2] = x;
            flat[index * 2 + 1] = y;
        });
        flat
    }
}
