use rand::Rng;

use crate::activation::activation::ActivationFunction;
use crate::error::{CrowdError, Result};
use crate::layers::param::Param;

/// Fully connected layer: `a = σ(x·W + b)`.
///
/// `W` has shape `[input_size, size]`, matching a row-vector input.
#[derive(Debug)]
pub struct Dense {
    pub size: usize,
    pub input_size: usize,
    pub weight: Param,
    pub bias: Param,
    pub activator: ActivationFunction,
    input: Vec<f64>,
    pre_neurons: Vec<f64>, // z = xW + b, needed for σ'(z)
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        input_size: usize,
        size: usize,
        activator: ActivationFunction,
        init_std: f64,
        rng: &mut R,
    ) -> Dense {
        Dense {
            size,
            input_size,
            weight: Param::normal(format!("{}.weight", name), vec![input_size, size], init_std, rng),
            bias: Param::zeros(format!("{}.bias", name), vec![size]),
            activator,
            input: Vec::new(),
            pre_neurons: Vec::new(),
        }
    }

    pub fn forward(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.input_size {
            return Err(CrowdError::Shape(format!(
                "dense expects {} inputs, got {}",
                self.input_size,
                input.len()
            )));
        }
        let mut z = self.bias.value.clone();
        for (i, &x) in input.iter().enumerate() {
            let row = &self.weight.value[i * self.size..(i + 1) * self.size];
            for (zj, &w) in z.iter_mut().zip(row) {
                *zj += x * w;
            }
        }
        let a = z.iter().map(|&v| self.activator.function(v)).collect();
        self.input = input.to_vec();
        self.pre_neurons = z;
        Ok(a)
    }

    /// Backprop from ∂L/∂a.
    pub fn backward(&mut self, grad_out: &[f64]) -> Result<Vec<f64>> {
        if self.pre_neurons.len() != grad_out.len() {
            return Err(CrowdError::NoForwardPass);
        }
        let delta: Vec<f64> = grad_out
            .iter()
            .zip(&self.pre_neurons)
            .map(|(g, &z)| g * self.activator.derivative(z))
            .collect();
        self.backward_pre(&delta)
    }

    /// Backprop from ∂L/∂z directly, for losses whose gradient is already
    /// expressed against the logits (sigmoid + BCE).
    pub fn backward_pre(&mut self, delta: &[f64]) -> Result<Vec<f64>> {
        if self.input.len() != self.input_size || delta.len() != self.size {
            return Err(CrowdError::NoForwardPass);
        }
        let mut grad_in = vec![0.0; self.input_size];
        for (i, &x) in self.input.iter().enumerate() {
            for j in 0..self.size {
                let idx = i * self.size + j;
                self.weight.grad[idx] += x * delta[j];
                grad_in[i] += self.weight.value[idx] * delta[j];
            }
        }
        for (b, d) in self.bias.grad.iter_mut().zip(delta) {
            *b += d;
        }
        Ok(grad_in)
    }

    pub fn params(&self) -> Vec<&Param> {
        vec![&self.weight, &self.bias]
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn forward_is_affine_for_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut d = Dense::new("d", 2, 1, ActivationFunction::Identity, 0.0, &mut rng);
        d.weight.value = vec![2.0, -1.0];
        d.bias.value = vec![0.5];
        assert_eq!(d.forward(&[3.0, 4.0]).unwrap(), vec![2.5]);
    }

    #[test]
    fn gradients_match_finite_difference() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut d = Dense::new("d", 3, 2, ActivationFunction::Sigmoid, 1.0, &mut rng);
        let x = [0.3, -1.2, 0.8];
        let out = d.forward(&x).unwrap();
        d.backward(&vec![1.0; out.len()]).unwrap();

        let h = 1e-6;
        for idx in 0..6 {
            let analytic = d.weight.grad[idx];
            d.weight.value[idx] += h;
            let up: f64 = d.forward(&x).unwrap().iter().sum();
            d.weight.value[idx] -= 2.0 * h;
            let down: f64 = d.forward(&x).unwrap().iter().sum();
            d.weight.value[idx] += h;
            assert!((analytic - (up - down) / (2.0 * h)).abs() < 1e-6);
        }
    }

    #[test]
    fn wrong_input_size_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut d = Dense::new("d", 2, 1, ActivationFunction::Identity, 0.1, &mut rng);
        assert!(d.forward(&[1.0]).is_err());
    }
}
