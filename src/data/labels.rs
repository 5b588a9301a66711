use serde::{Deserialize, Serialize};

/// Buckets ground-truth counts into `num_classes` count classes.
///
/// With `bin = (max - min) / num_classes`, a count `c` falls in
/// `min(round(c / bin), num_classes - 1)`. A degenerate dataset where every
/// sample has the same count puts everything in class 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountClasses {
    pub num_classes: usize,
    pub min_count: f64,
    pub max_count: f64,
    pub bin: f64,
}

impl CountClasses {
    pub fn from_counts(counts: &[f64], num_classes: usize) -> CountClasses {
        let min_count = counts.iter().copied().fold(f64::INFINITY, f64::min);
        let max_count = counts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min_count, max_count) = if counts.is_empty() { (0.0, 0.0) } else { (min_count, max_count) };
        CountClasses {
            num_classes,
            min_count,
            max_count,
            bin: (max_count - min_count) / num_classes as f64,
        }
    }

    pub fn class_of(&self, count: f64) -> usize {
        if self.bin <= 0.0 || !count.is_finite() {
            return 0;
        }
        let idx = (count / self.bin).round().max(0.0) as usize;
        idx.min(self.num_classes - 1)
    }

    pub fn histogram(&self, counts: &[f64]) -> Vec<usize> {
        let mut hist = vec![0usize; self.num_classes];
        for &c in counts {
            hist[self.class_of(c)] += 1;
        }
        hist
    }
}

/// Per-class loss weights for the auxiliary classification head.
///
/// Computed once from the training set's class histogram as
/// `w = 1 - h / Σh`, then normalised to sum to 1, so rarer classes weigh
/// more. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights(Vec<f64>);

impl ClassWeights {
    pub fn from_histogram(hist: &[usize]) -> ClassWeights {
        let total: usize = hist.iter().sum();
        if total == 0 || hist.len() < 2 {
            return ClassWeights::uniform(hist.len().max(1));
        }
        let raw: Vec<f64> = hist.iter().map(|&h| 1.0 - h as f64 / total as f64).collect();
        let norm: f64 = raw.iter().sum();
        ClassWeights(raw.into_iter().map(|w| w / norm).collect())
    }

    pub fn uniform(num_classes: usize) -> ClassWeights {
        ClassWeights(vec![1.0 / num_classes as f64; num_classes])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_rounded_bins() {
        let counts = [0.0, 10.0, 55.0, 100.0];
        let cc = CountClasses::from_counts(&counts, 10);
        assert_eq!(cc.bin, 10.0);
        assert_eq!(cc.class_of(0.0), 0);
        assert_eq!(cc.class_of(14.0), 1);
        assert_eq!(cc.class_of(55.0), 6); // round(5.5)
        assert_eq!(cc.class_of(100.0), 9); // clamped
    }

    #[test]
    fn constant_counts_land_in_class_zero() {
        let cc = CountClasses::from_counts(&[3.0, 3.0], 10);
        assert_eq!(cc.class_of(3.0), 0);
        assert_eq!(cc.histogram(&[3.0, 3.0])[0], 2);
    }

    #[test]
    fn weights_favour_rare_classes_and_sum_to_one() {
        let w = ClassWeights::from_histogram(&[6, 3, 1, 0]);
        let s: f64 = w.as_slice().iter().sum();
        assert!((s - 1.0).abs() < 1e-12);
        let w = w.as_slice();
        assert!(w[0] < w[1] && w[1] < w[2] && w[2] < w[3]);
    }
}
