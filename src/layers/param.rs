use rand::Rng;

use crate::math::grid::sample_standard_normal;

/// A named trainable tensor and its accumulated gradient.
///
/// Values are stored flat in row-major order; `shape` only documents the
/// layout and is checked when loading a state dict.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub shape: Vec<usize>,
    pub value: Vec<f64>,
    pub grad: Vec<f64>,
}

impl Param {
    pub fn zeros(name: impl Into<String>, shape: Vec<usize>) -> Param {
        let n = shape.iter().product();
        Param { name: name.into(), shape, value: vec![0.0; n], grad: vec![0.0; n] }
    }

    /// Samples N(0, std_dev) for every element.
    pub fn normal<R: Rng + ?Sized>(
        name: impl Into<String>,
        shape: Vec<usize>,
        std_dev: f64,
        rng: &mut R,
    ) -> Param {
        let mut p = Param::zeros(name, shape);
        for v in p.value.iter_mut() {
            *v = sample_standard_normal(rng) * std_dev;
        }
        p
    }

    pub fn numel(&self) -> usize {
        self.value.len()
    }

    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }
}
