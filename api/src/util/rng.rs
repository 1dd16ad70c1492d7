//! Seeded linear-congruential generator for arena layout.
//!
//! Kept separate from the gameplay RNG so map regeneration is reproducible no
//! matter how much loot or bot randomness was consumed elsewhere.

/// Knuth MMIX constants
const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        // Scramble once so small seeds (0, 1, 2...) diverge immediately
        let mut lcg = Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        };
        lcg.next_u32();
        lcg
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        // High bits have the longest period
        (self.state >> 32) as u32
    }

    /// Uniform float in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform float in `[min, max)`
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }

    /// Uniform index in `[0, len)`; `len` must be non-zero
    pub fn index(&mut self, len: usize) -> usize {
        (self.next_u32() as usize) % len.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Lcg::new(1);
        let mut b = Lcg::new(2);
        let same = (0..32).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 4);
    }

    #[test]
    fn test_f32_in_unit_range() {
        let mut rng = Lcg::new(7);
        for _ in 0..10_000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_range_and_index_bounds() {
        let mut rng = Lcg::new(99);
        for _ in 0..1000 {
            let v = rng.range(-5.0, 5.0);
            assert!((-5.0..=5.0).contains(&v));
            assert!(rng.index(3) < 3);
        }
    }
}
