/// 1-second sampled EWMA realized vol.
/// Instead of updating on every tick (NBBO mid recomputes on every venue
/// update, mostly unchanged), samples once per second, computing
/// log-returns between samples.
/// sigma is directly in per-second units — no trades_per_sec conversion needed.
#[derive(Clone)]
pub struct SampledEwmaVol {
    lambda: f64,
    sigma_sq: f64,
    last_sample_price: f64,
    last_sample_ts: i64,
    seeded: bool,
    n_samples: u32,
    min_samples: u32,
}

impl SampledEwmaVol {
    pub fn new(lambda: f64, min_samples: u32) -> Self {
        Self {
            lambda,
            sigma_sq: 0.0,
            last_sample_price: 0.0,
            last_sample_ts: 0,
            seeded: false,
            n_samples: 0,
            min_samples,
        }
    }

    /// Update with a new trade. Only computes a return when ≥1000ms have elapsed.
    /// Returns true if a new sample was taken (sigma_sq updated).
    #[inline]
    pub fn update(&mut self, price: f64, ts_ms: i64) -> bool {
        if price <= 0.0 {
            return false;
        }
        if !self.seeded {
            // First ever price — seed, no return yet
            self.last_sample_price = price;
            self.last_sample_ts = ts_ms;
            self.seeded = true;
            return false;
        }
        let elapsed = ts_ms - self.last_sample_ts;
        if elapsed < 1000 {
            return false;
        }
        // Compute log-return normalized to per-second
        let dt_s = elapsed as f64 / 1000.0;
        let r = (price / self.last_sample_price).ln();
        let r_sq_per_sec = (r * r) / dt_s;

        self.sigma_sq = self.lambda * self.sigma_sq + (1.0 - self.lambda) * r_sq_per_sec;
        self.n_samples += 1;
        self.last_sample_price = price;
        self.last_sample_ts = ts_ms;
        true
    }

    /// Per-second realized vol. Directly usable — no conversion needed.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma_sq.sqrt()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.n_samples >= self.min_samples
    }

    #[inline]
    pub fn n_samples(&self) -> u32 {
        self.n_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: SampledEwmaVol fed constant price 100,000 at 1-second intervals for 10 ticks.
    /// Expected: First update seeds only (returns false); subsequent updates sample (return true); sigma ≈ 0.
    #[test]
    fn test_sampled_ewma_basic() {
        let mut vol = SampledEwmaVol::new(0.94, 5);
        let base_price = 100_000.0;
        // Feed prices at 1-second intervals
        for i in 0..10 {
            let sampled = vol.update(base_price, i * 1000);
            if i == 0 {
                assert!(!sampled, "First price should just seed");
            } else {
                assert!(sampled, "Each subsequent 1s gap should sample");
            }
        }
        // Constant price → sigma ≈ 0
        assert!(vol.sigma() < 1e-10, "Constant price sigma = {}", vol.sigma());
    }

    /// Scenario: SampledEwmaVol fed prices alternating between 100,000 and 100,100 at 1-second intervals.
    /// Expected: sigma > 0 (real volatility from 0.1% swings) and < 0.01 per second, and is_valid after 5+ samples.
    #[test]
    fn test_sampled_ewma_volatile() {
        let mut vol = SampledEwmaVol::new(0.94, 5);
        // Alternating prices at 1-second intervals → actual vol
        for i in 0..20 {
            let price = if i % 2 == 0 { 100_000.0 } else { 100_100.0 };
            vol.update(price, i * 1000);
        }
        assert!(vol.is_valid());
        assert!(vol.sigma() > 0.0, "Volatile sigma should be > 0");
        // sigma should be roughly 0.001/s (0.1% per second)
        assert!(vol.sigma() < 0.01, "sigma = {}", vol.sigma());
    }

    /// Scenario: SampledEwmaVol seeded at t=0, then 99 rapid ticks spaced 10ms apart (all < 1s from seed).
    /// Expected: All sub-second updates return false and n_samples stays at 0 (no sampling occurs).
    #[test]
    fn test_sampled_ewma_skips_sub_second() {
        let mut vol = SampledEwmaVol::new(0.94, 5);
        vol.update(100_000.0, 0);
        // Rapid-fire ticks within 1 second — should all be ignored
        for i in 1..100 {
            let sampled = vol.update(100_010.0, i * 10); // 10ms apart
            assert!(!sampled, "Sub-second tick at {}ms should not sample", i * 10);
        }
        assert_eq!(vol.n_samples(), 0);
    }

    /// Scenario: SampledEwmaVol with min_samples=10 fed 11 prices at 1-second intervals (first seeds, 9 sample).
    /// Expected: is_valid() is false after 9 samples, true after the 10th sample at t=10s.
    #[test]
    fn test_sampled_ewma_validity() {
        let mut vol = SampledEwmaVol::new(0.94, 10);
        for i in 0..10 {
            vol.update(100_000.0 + i as f64, i * 1000);
        }
        assert!(!vol.is_valid()); // 9 samples (first is seed)
        vol.update(100_010.0, 10_000);
        assert!(vol.is_valid()); // 10th sample
    }

    /// Scenario: SampledEwmaVol receives price=0 first (rejected), then valid prices at 1-second intervals.
    /// Expected: Zero price does not seed; the first valid price seeds, and the second valid price produces the first sample.
    #[test]
    fn test_sampled_ewma_zero_price_rejected() {
        let mut vol = SampledEwmaVol::new(0.94, 5);
        let sampled = vol.update(0.0, 0);
        assert!(!sampled);
        // Should not seed — next valid price should seed instead
        let sampled = vol.update(100.0, 1000);
        assert!(!sampled); // seeds, doesn't sample
        let sampled = vol.update(101.0, 2000);
        assert!(sampled); // now computes return
        assert_eq!(vol.n_samples(), 1);
    }

    /// Scenario: SampledEwmaVol seeded at t=0, next update at t=5s with a small price change.
    /// Expected: r_sq_per_sec = ln(100100/100000)^2 / 5.0, and sigma_sq = (1-lambda) * r_sq_per_sec, normalizing for the multi-second gap.
    #[test]
    fn test_sampled_ewma_multi_second_gap() {
        let mut vol = SampledEwmaVol::new(0.94, 1);
        vol.update(100_000.0, 0);       // seed
        vol.update(100_100.0, 5_000);   // 5 second gap
        // r = ln(100100/100000), dt_s = 5.0
        // r_sq_per_sec = r^2 / 5.0
        let r = (100_100.0_f64 / 100_000.0).ln();
        let expected_sq = (1.0 - 0.94) * (r * r / 5.0);
        assert!((vol.sigma_sq - expected_sq).abs() < 1e-15, "sigma_sq = {}, expected = {}", vol.sigma_sq, expected_sq);
    }

    /// Scenario: SampledEwmaVol seeded, then updated at 1s, 0.5s (sub-second, skipped), and 2s.
    /// Expected: n_samples increments only on updates >= 1s apart; sub-second tick does not count.
    #[test]
    fn test_sampled_ewma_n_samples_accessor() {
        let mut vol = SampledEwmaVol::new(0.94, 5);
        assert_eq!(vol.n_samples(), 0);
        vol.update(100.0, 0); // seed
        assert_eq!(vol.n_samples(), 0);
        vol.update(101.0, 1000); // sample 1
        assert_eq!(vol.n_samples(), 1);
        vol.update(102.0, 500); // < 1000ms since last sample → skipped
        assert_eq!(vol.n_samples(), 1);
        vol.update(103.0, 2000); // sample 2
        assert_eq!(vol.n_samples(), 2);
    }

    /// Scenario: Two SampledEwmaVol instances fed calm (+/-$10) vs wild (+/-$500) price oscillations.
    /// Expected: The wild tracker produces a higher sigma than the calm tracker, confirming monotonicity.
    #[test]
    fn test_sampled_ewma_sigma_increases_with_vol() {
        // Higher price swings → higher sigma
        let mut vol_calm = SampledEwmaVol::new(0.94, 1);
        let mut vol_wild = SampledEwmaVol::new(0.94, 1);

        for i in 0..20 {
            let ts = i * 1000;
            let calm_price = 100_000.0 + (i % 2) as f64 * 10.0;  // ±$10
            let wild_price = 100_000.0 + (i % 2) as f64 * 500.0; // ±$500
            vol_calm.update(calm_price, ts);
            vol_wild.update(wild_price, ts);
        }

        assert!(vol_wild.sigma() > vol_calm.sigma(),
            "Wild sigma ({}) should exceed calm sigma ({})", vol_wild.sigma(), vol_calm.sigma());
    }
}
