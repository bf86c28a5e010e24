use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random source for the strategy switch.
pub trait Dice: Send {
    /// Draw in `0..range`. A `range` of 0 yields 0.
    fn roll(&mut self, range: u32) -> u32;
}

pub struct RandomDice(StdRng);

impl RandomDice {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Dice for RandomDice {
    fn roll(&mut self, range: u32) -> u32 {
        if range == 0 {
            return 0;
        }
        self.0.gen_range(0..range)
    }
}
