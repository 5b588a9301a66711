use rand::rngs::StdRng;
use rand::SeedableRng;

/// The three random streams of a run.
///
/// All derive from one seed so fixing it reproduces weight init, sample
/// order, and augmentation together.
pub struct Rngs {
    pub init: StdRng,
    pub shuffle: StdRng,
    pub augment: StdRng,
}

impl Rngs {
    pub fn new(seed: Option<u64>) -> Rngs {
        match seed {
            Some(seed) => Rngs {
                init: StdRng::seed_from_u64(seed),
                shuffle: StdRng::seed_from_u64(seed.wrapping_add(1)),
                augment: StdRng::seed_from_u64(seed.wrapping_add(2)),
            },
            None => Rngs {
                init: StdRng::from_entropy(),
                shuffle: StdRng::from_entropy(),
                augment: StdRng::from_entropy(),
            },
        }
    }
}
