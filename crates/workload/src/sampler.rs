use rand::Rng;

/// Decides per request whether diagnostics are captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticsSampler {
    rate: f64,
}

impl DiagnosticsSampler {
    /// `rate` is clamped to [0, 1].
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        if self.rate >= 1.0 {
            true
        } else if self.rate <= 0.0 {
            false
        } else {
            rng.gen::<f64>() < self.rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn extremes_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        let always = DiagnosticsSampler::new(1.0);
        let never = DiagnosticsSampler::new(0.0);
        for _ in 0..100 {
            assert!(always.sample(&mut rng));
            assert!(!never.sample(&mut rng));
        }
    }

    #[test]
    fn fraction_roughly_matches_rate() {
        let mut rng = StdRng::seed_from_u64(99);
        let sampler = DiagnosticsSampler::new(0.25);
        let hits = (0..10_000).filter(|_| sampler.sample(&mut rng)).count();
        assert!((2_000..3_000).contains(&hits), "got {hits}");
    }

    #[test]
    fn out_of_range_clamped() {
        assert_eq!(DiagnosticsSampler::new(3.0).rate(), 1.0);
        assert_eq!(DiagnosticsSampler::new(-1.0).rate(), 0.0);
        assert_eq!(DiagnosticsSampler::new(f64::NAN).rate(), 0.0);
    }
}
