/// Binary cross-entropy with a per-output weight, applied to sigmoid
/// probabilities.
pub struct WeightedBceLoss;

const EPS: f64 = 1e-12;

impl WeightedBceLoss {
    /// Scalar loss: mean_k( -w_k·(y_k·log(p_k+ε) + (1-y_k)·log(1-p_k+ε)) )
    pub fn loss(predicted: &[f64], expected: &[f64], weights: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter()).zip(weights.iter())
            .map(|((p, y), w)| -w * (y * (p + EPS).ln() + (1.0 - y) * (1.0 - p + EPS).ln()))
            .sum::<f64>() / n
    }

    /// Gradient with respect to the pre-sigmoid logits: w_k·(p_k - y_k) / n.
    ///
    /// Sigmoid and BCE compose into this closed form, so the caller feeds it
    /// straight into `Dense::backward_pre`.
    pub fn logit_gradient(predicted: &[f64], expected: &[f64], weights: &[f64]) -> Vec<f64> {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter()).zip(weights.iter())
            .map(|((p, y), w)| w * (p - y) / n)
            .collect()
    }
}
