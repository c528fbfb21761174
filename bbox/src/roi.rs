/// Region of interest stored in `(xmin, ymin, xmax, ymax)` order.
///
/// The values are usually normalized to the image size. Regression targets of
/// negative samples may fall outside `[0, 1]` or be unordered, so the
/// constructor does not validate them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Roi<T> {
    xmin: T,
    ymin: T,
    xmax: T,
    ymax: T,
}

impl<T> Roi<T>
where
    T: Copy,
{
    pub fn from_xyxy(xyxy: [T; 4]) -> Self {
        let [xmin, ymin, xmax, ymax] = xyxy;
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn xyxy(&self) -> [T; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    pub fn xmin(&self) -> T {
        self.xmin
    }

    pub fn ymin(&self) -> T {
        self.ymin
    }

    pub fn xmax(&self) -> T {
        self.xmax
    }

    pub fn ymax(&self) -> T {
        self.ymax
    }
}
