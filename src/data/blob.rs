use crate::math::grid::Grid;

/// One training sample: grayscale image, aligned ground-truth density map,
/// and its count class.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Raw pixel intensities in `[0, 255]`.
    pub image: Grid,
    pub gt_density: Grid,
    pub gt_class: usize,
    /// One-hot encoding of `gt_class`.
    pub gt_class_label: Vec<f64>,
    pub fname: String,
}

impl Blob {
    /// Ground-truth head count (mass of the density map).
    pub fn gt_count(&self) -> f64 {
        self.gt_density.sum()
    }
}

/// One-hot vector of length `num_classes` with a 1 at `class`.
pub fn one_hot(class: usize, num_classes: usize) -> Vec<f64> {
    let mut v = vec![0.0; num_classes];
    v[class] = 1.0;
    v
}
