/// Small deterministic generator for clip selection. Seeded per orchestrator
/// instance so replays of the same request sequence pick the same clips.
#[derive(Clone, Copy, Debug)]
pub struct Rng64 {
    state: u64,
}

impl Rng64 {
    /// Create a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        // SplitMix64
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 bits of precision.
        let v = self.next_u64() >> 11;
        (v as f64) * (1.0 / ((1u64 << 53) as f64))
    }

    /// Uniform index into a collection of `len` items. `len` must be > 0.
    pub fn pick_index(&mut self, len: usize) -> usize {
        ((self.next_f64_01() * len as f64) as usize).min(len.saturating_sub(1))
    }

    /// Uniform index into `len` items skipping `excluded`. Requires `len >= 2`
    /// and `excluded < len`.
    pub fn pick_index_excluding(&mut self, len: usize, excluded: usize) -> usize {
        let i = self.pick_index(len - 1);
        if i >= excluded { i + 1 } else { i }
    }

    /// Weight-proportional index into `weights`. Non-finite or non-positive
    /// weights contribute nothing; if no weight does, the pick falls back to
    /// uniform. `weights` must be non-empty.
    pub fn pick_weighted(&mut self, weights: &[f64]) -> usize {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().copied().map(clean).sum();
        if total <= 0.0 {
            return self.pick_index(weights.len());
        }
        let mut target = self.next_f64_01() * total;
        let mut last = 0;
        for (i, &w) in weights.iter().enumerate() {
            let w = clean(w);
            if w <= 0.0 {
                continue;
            }
            if target < w {
                return i;
            }
            target -= w;
            last = i;
        }
        last
    }
}
