use rand::Rng;

use crate::activation::activation::ActivationFunction;
use crate::error::{CrowdError, Result};
use crate::layers::param::Param;
use crate::math::grid::Grid;

/// 2-D convolution with stride 1 and "same" zero padding, followed by an
/// element-wise activation.
///
/// Weight layout is `[out_channels, in_channels, k, k]`. The kernel size must
/// be odd so the output keeps the input's spatial size.
#[derive(Debug)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub weight: Param,
    pub bias: Param,
    pub activator: ActivationFunction,
    // cached by `forward` for the backward pass
    input: Vec<Grid>,
    pre_activation: Vec<Grid>,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        activator: ActivationFunction,
        init_std: f64,
        rng: &mut R,
    ) -> Result<Conv2d> {
        if kernel_size % 2 == 0 {
            return Err(CrowdError::Config(format!(
                "kernel size must be odd, got {}",
                kernel_size
            )));
        }
        let weight = Param::normal(
            format!("{}.weight", name),
            vec![out_channels, in_channels, kernel_size, kernel_size],
            init_std,
            rng,
        );
        let bias = Param::zeros(format!("{}.bias", name), vec![out_channels]);
        Ok(Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            weight,
            bias,
            activator,
            input: Vec::new(),
            pre_activation: Vec::new(),
        })
    }

    #[inline]
    fn w_index(&self, o: usize, i: usize, ky: usize, kx: usize) -> usize {
        ((o * self.in_channels + i) * self.kernel_size + ky) * self.kernel_size + kx
    }

    /// Forward pass; stores input and pre-activation planes for backprop.
    pub fn forward(&mut self, input: &[Grid]) -> Result<Vec<Grid>> {
        if input.len() != self.in_channels {
            return Err(CrowdError::Shape(format!(
                "conv expects {} input channels, got {}",
                self.in_channels,
                input.len()
            )));
        }
        let (rows, cols) = input[0].shape();
        if input.iter().any(|g| g.shape() != (rows, cols)) {
            return Err(CrowdError::Shape("input channels differ in size".into()));
        }

        let pad = (self.kernel_size / 2) as isize;
        let mut pre = Vec::with_capacity(self.out_channels);
        for o in 0..self.out_channels {
            let mut z = Grid::filled(rows, cols, self.bias.value[o]);
            for (i, plane) in input.iter().enumerate() {
                for ky in 0..self.kernel_size {
                    for kx in 0..self.kernel_size {
                        let w = self.weight.value[self.w_index(o, i, ky, kx)];
                        if w == 0.0 {
                            continue;
                        }
                        let dy = ky as isize - pad;
                        let dx = kx as isize - pad;
                        for y in 0..rows {
                            let sy = y as isize + dy;
                            if sy < 0 || sy >= rows as isize {
                                continue;
                            }
                            for x in 0..cols {
                                let sx = x as isize + dx;
                                if sx < 0 || sx >= cols as isize {
                                    continue;
                                }
                                z.add_at(y, x, w * plane.get(sy as usize, sx as usize));
                            }
                        }
                    }
                }
            }
            pre.push(z);
        }

        let out = pre.iter().map(|z| z.map(|v| self.activator.function(v))).collect();
        self.input = input.to_vec();
        self.pre_activation = pre;
        Ok(out)
    }

    /// Accumulates parameter gradients from `grad_out` (∂L/∂a for each output
    /// plane) and returns ∂L/∂input.
    pub fn backward(&mut self, grad_out: &[Grid]) -> Result<Vec<Grid>> {
        if self.input.is_empty() {
            return Err(CrowdError::NoForwardPass);
        }
        if grad_out.len() != self.out_channels {
            return Err(CrowdError::Shape(format!(
                "conv backward expects {} gradient planes, got {}",
                self.out_channels,
                grad_out.len()
            )));
        }
        let (rows, cols) = self.input[0].shape();
        if grad_out.iter().any(|g| g.shape() != (rows, cols)) {
            return Err(CrowdError::Shape("conv backward gradient differs from input size".into()));
        }
        let pad = (self.kernel_size / 2) as isize;
        let mut grad_in = vec![Grid::zeros(rows, cols); self.in_channels];

        for o in 0..self.out_channels {
            // δ = ∂L/∂a ⊙ σ'(z)
            let delta = Grid {
                rows,
                cols,
                data: grad_out[o]
                    .data
                    .iter()
                    .zip(&self.pre_activation[o].data)
                    .map(|(g, &z)| g * self.activator.derivative(z))
                    .collect(),
            };
            self.bias.grad[o] += delta.sum();

            for i in 0..self.in_channels {
                for ky in 0..self.kernel_size {
                    for kx in 0..self.kernel_size {
                        let idx = self.w_index(o, i, ky, kx);
                        let w = self.weight.value[idx];
                        let dy = ky as isize - pad;
                        let dx = kx as isize - pad;
                        let mut acc = 0.0;
                        for y in 0..rows {
                            let sy = y as isize + dy;
                            if sy < 0 || sy >= rows as isize {
                                continue;
                            }
                            for x in 0..cols {
                                let sx = x as isize + dx;
                                if sx < 0 || sx >= cols as isize {
                                    continue;
                                }
                                let d = delta.get(y, x);
                                acc += d * self.input[i].get(sy as usize, sx as usize);
                                grad_in[i].add_at(sy as usize, sx as usize, d * w);
                            }
                        }
                        self.weight.grad[idx] += acc;
                    }
                }
            }
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
