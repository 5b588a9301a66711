use std::collections::HashMap;

use crate::layers::param::Param;
use crate::optim::Optimizer;

struct Moments {
    m: Vec<f64>,
    v: Vec<f64>,
}

/// Adam with bias-corrected first and second moments.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    t: i32,
    moments: HashMap<String, Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            moments: HashMap::new(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<&mut Param>) {
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);
        for param in params {
            let n = param.numel();
            let state = self
                .moments
                .entry(param.name.clone())
                .or_insert_with(|| Moments { m: vec![0.0; n], v: vec![0.0; n] });
            for i in 0..n {
                let g = param.grad[i];
                state.m[i] = self.beta1 * state.m[i] + (1.0 - self.beta1) * g;
                state.v[i] = self.beta2 * state.v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = state.m[i] / bc1;
                let v_hat = state.v[i] / bc2;
                param.value[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
