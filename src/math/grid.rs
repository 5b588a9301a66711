use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{CrowdError, Result};

/// Row-major 2-D field of `f64` values.
///
/// Used for grayscale images, density maps, and the per-channel feature
/// planes of the network. `data.len() == rows * cols` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Grid {
    pub fn zeros(rows: usize, cols: usize) -> Grid {
        Grid { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Grid {
        Grid { rows, cols, data: vec![value; rows * cols] }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Grid> {
        if data.len() != rows * cols {
            return Err(CrowdError::Shape(format!(
                "{} values cannot fill a {}x{} grid",
                data.len(), rows, cols
            )));
        }
        Ok(Grid { rows, cols, data })
    }

    /// Builds a grid from equally long rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Grid> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(i) = rows.iter().position(|r| r.len() != n_cols) {
            return Err(CrowdError::Shape(format!(
                "row {} has {} values, expected {}",
                i, rows[i].len(), n_cols
            )));
        }
        Ok(Grid { rows: n_rows, cols: n_cols, data: rows.into_iter().flatten().collect() })
    }

    /// Samples every cell from N(0, std_dev).
    pub fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> Grid {
        let data = (0..rows * cols)
            .map(|_| sample_standard_normal(rng) * std_dev)
            .collect();
        Grid { rows, cols, data }
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] = value;
    }

    #[inline]
    pub fn add_at(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] += value;
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest value, or `0.0` for an empty grid.
    pub fn max(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.sum() / self.len() as f64
    }

    pub fn map<F>(&self, functor: F) -> Grid
    where
        F: Fn(f64) -> f64,
    {
        Grid {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Mirrors the grid left to right.
    pub fn flip_horizontal(&self) -> Grid {
        let mut res = Grid::zeros(self.rows, self.cols);
        for r in 0..self.rows {
            for c in 0..self.cols {
                res.set(r, self.cols - 1 - c, self.get(r, c));
            }
        }
        res
    }

    /// Sums non-overlapping `factor x factor` blocks. Both dimensions must be
    /// divisible by `factor`.
    pub fn sum_pool(&self, factor: usize) -> Result<Grid> {
        if factor == 0 || self.rows % factor != 0 || self.cols % factor != 0 {
            return Err(CrowdError::Shape(format!(
                "{}x{} grid cannot be pooled by {}",
                self.rows, self.cols, factor
            )));
        }
        let mut res = Grid::zeros(self.rows / factor, self.cols / factor);
        for r in 0..self.rows {
            for c in 0..self.cols {
                res.add_at(r / factor, c / factor, self.get(r, c));
            }
        }
        Ok(res)
    }

    /// Repeats every cell into a `factor x factor` block.
    pub fn upsample_nearest(&self, factor: usize) -> Grid {
        let mut res = Grid::zeros(self.rows * factor, self.cols * factor);
        for r in 0..res.rows {
            for c in 0..res.cols {
                res.set(r, c, self.get(r / factor, c / factor));
            }
        }
        res
    }

    /// Bilinear resample to `rows x cols` using half-pixel centres.
    pub fn resize_bilinear(&self, rows: usize, cols: usize) -> Grid {
        if rows == self.rows && cols == self.cols {
            return self.clone();
        }
        let mut res = Grid::zeros(rows, cols);
        if self.is_empty() {
            return res;
        }
        let scale_r = self.rows as f64 / rows as f64;
        let scale_c = self.cols as f64 / cols as f64;
        for r in 0..rows {
            let (r0, r1, fr) = source_span(r, scale_r, self.rows);
            for c in 0..cols {
                let (c0, c1, fc) = source_span(c, scale_c, self.cols);
                let top = self.get(r0, c0) * (1.0 - fc) + self.get(r0, c1) * fc;
                let bottom = self.get(r1, c0) * (1.0 - fc) + self.get(r1, c1) * fc;
                res.set(r, c, top * (1.0 - fr) + bottom * fr);
            }
        }
        res
    }

    /// Resamples a density map and rescales it so the total mass (the count)
    /// is unchanged.
    pub fn resize_preserving_sum(&self, rows: usize, cols: usize) -> Grid {
        let original = self.sum();
        let resized = self.resize_bilinear(rows, cols);
        let current = resized.sum();
        if current.abs() < f64::EPSILON {
            return resized;
        }
        let ratio = original / current;
        resized.map(|x| x * ratio)
    }
}

/// Source row/column pair and interpolation weight for one output index.
fn source_span(dst: usize, scale: f64, len: usize) -> (usize, usize, f64) {
    let src = ((dst as f64 + 0.5) * scale - 0.5).max(0.0);
    let lo = (src.floor() as usize).min(len - 1);
    let hi = (lo + 1).min(len - 1);
    (lo, hi, src - lo as f64)
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl Default for Grid {
    fn default() -> Self {
        Grid { rows: 0, cols: 0, data: vec![] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp(rows: usize, cols: usize) -> Grid {
        Grid::from_vec(rows, cols, (0..rows * cols).map(|x| x as f64).collect()).unwrap()
    }

    #[test]
    fn flip_mirrors_columns() {
        let g = ramp(2, 3);
        let f = g.flip_horizontal();
        assert_eq!(f.data, vec![2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);
        assert_eq!(f.flip_horizontal(), g);
    }

    #[test]
    fn sum_pool_keeps_total() {
        let g = ramp(4, 8);
        let p = g.sum_pool(4).unwrap();
        assert_eq!(p.shape(), (1, 2));
        assert!((p.sum() - g.sum()).abs() < 1e-9);
        assert!(g.sum_pool(3).is_err());
    }

    #[test]
    fn resize_preserving_sum_keeps_count() {
        let g = Grid::filled(6, 10, 0.25);
        let down = g.resize_preserving_sum(3, 4);
        assert_eq!(down.shape(), (3, 4));
        assert!((down.sum() - g.sum()).abs() < 1e-9);

        let r = ramp(5, 7);
        let up = r.resize_preserving_sum(12, 16);
        assert!((up.sum() - r.sum()).abs() < 1e-6);
    }

    #[test]
    fn bilinear_identity_when_same_size() {
        let g = ramp(3, 3);
        assert_eq!(g.resize_bilinear(3, 3), g);
    }

    #[test]
    fn from_rows_rejects_ragged() {
        assert!(Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        let g = Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(g.get(1, 0), 3.0);
    }

    #[test]
    fn normal_init_is_seeded() {
        let a = Grid::normal(4, 4, 0.01, &mut StdRng::seed_from_u64(7));
        let b = Grid::normal(4, 4, 0.01, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.data.iter().all(|x| x.abs() < 0.1));
    }

    #[test]
    fn max_of_empty_is_zero() {
        assert_eq!(Grid::default().max(), 0.0);
        assert_eq!(ramp(2, 2).max(), 3.0);
    }
}
