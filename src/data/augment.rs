use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::blob::Blob;

/// On-the-fly augmentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Probability of a joint horizontal flip of image and density.
    pub flip_prob: f64,
    /// Probability of adding uniform pixel noise to the image.
    pub noise_prob: f64,
    /// Noise is drawn from `[-noise_amplitude, noise_amplitude)`.
    pub noise_amplitude: f64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        AugmentConfig { flip_prob: 0.5, noise_prob: 0.5, noise_amplitude: 10.0 }
    }
}

/// What `augment` did to a blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub flipped: bool,
    pub noised: bool,
}

/// Applies the stochastic transforms in place.
///
/// The flip always moves image and density together. Noise touches the
/// image only, so the ground-truth count never changes.
pub fn augment<R: Rng + ?Sized>(blob: &mut Blob, config: &AugmentConfig, rng: &mut R) -> Applied {
    let mut applied = Applied::default();

    if rng.gen::<f64>() < config.flip_prob {
        blob.image = blob.image.flip_horizontal();
        blob.gt_density = blob.gt_density.flip_horizontal();
        applied.flipped = true;
    }

    if rng.gen::<f64>() < config.noise_prob {
        let amp = config.noise_amplitude;
        if amp > 0.0 {
            for v in blob.image.data.iter_mut() {
                *v += rng.gen_range(-amp..amp);
            }
        }
        applied.noised = true;
    }

    applied
}
