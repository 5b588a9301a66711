use std::collections::HashMap;

use crate::layers::param::Param;
use crate::optim::Optimizer;

/// Stochastic gradient descent with classical momentum:
/// `v = μ·v + g; θ = θ - lr·v`.
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: HashMap<String, Vec<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64) -> Sgd {
        Sgd { learning_rate, momentum, velocity: HashMap::new() }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<&mut Param>) {
        for param in params {
            let v = self
                .velocity
                .entry(param.name.clone())
                .or_insert_with(|| vec![0.0; param.numel()]);
            for ((value, grad), vel) in param.value.iter_mut().zip(&param.grad).zip(v.iter_mut()) {
                *vel = self.momentum * *vel + grad;
                *value -= self.learning_rate * *vel;
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
