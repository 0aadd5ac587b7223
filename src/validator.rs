use crate::model::PriceSample;

// Hard sanity bounds for any observed price, whatever the source.
const ABS_MIN_PRICE: f64 = 0.01;
const ABS_MAX_PRICE: f64 = 1_000_000.0;

/// Filters raw competitor price observations before they reach the optimizer.
/// A single noisy observation (an accessory price, a shipping fee picked up
/// as a product price) must not corrupt the recommendation.
pub struct PriceSampleValidator {
    major_retailers: Vec<String>,
}

impl PriceSampleValidator {
    pub fn new(major_retailers: &[String]) -> Self {
        Self {
            major_retailers: major_retailers.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    fn is_major_retailer(&self, source: &str) -> bool {
        let source = source.to_lowercase();
        self.major_retailers.iter().any(|r| *r == source)
    }

    /// Pure predicate: does this observation make sense for a product with
    /// the given cost and current price? Checks run in order: absolute
    /// bounds, cost-relative bounds, current-price-relative bounds. Each
    /// relative check only applies when its reference value is positive.
    pub fn validate(&self, sample: &PriceSample, cost_price: f64, current_price: f64) -> bool {
        let price = sample.price;

        if price < ABS_MIN_PRICE || price > ABS_MAX_PRICE {
            return false;
        }

        // Major retailers are more trusted, so their bounds are looser.
        let major = self.is_major_retailer(&sample.source);

        if cost_price > 0.0 {
            let min_cost_ratio = if major { 0.4 } else { 0.5 };
            if price < cost_price * min_cost_ratio {
                return false;
            }
            // Expensive goods should not show up at a tiny fraction of their
            // observed price scale; only meaningful once cost exceeds 100.
            let max_cost_ratio = if major { 15.0 } else { 10.0 };
            if cost_price > 100.0 && price > cost_price * max_cost_ratio {
                return false;
            }
        }

        if current_price > 0.0 {
            let (min_factor, max_factor) = if major { (0.05, 6.0) } else { (0.1, 5.0) };
            if price < current_price * min_factor || price > current_price * max_factor {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(price: f64, source: &str) -> PriceSample {
        PriceSample {
            price,
            source: source.to_string(),
            url: String::new(),
            observed_at: Utc::now(),
        }
    }

    fn validator() -> PriceSampleValidator {
        PriceSampleValidator::new(&[
            "amazon".to_string(),
            "walmart".to_string(),
            "target".to_string(),
        ])
    }

    #[test]
    fn rejects_outside_absolute_bounds() {
        let v = validator();
        assert!(!v.validate(&sample(0.001, "amazon"), 0.0, 0.0));
        assert!(!v.validate(&sample(1_000_001.0, "amazon"), 0.0, 0.0));
        assert!(v.validate(&sample(19.99, "unknown-shop"), 0.0, 0.0));
    }

    #[test]
    fn cost_floor_depends_on_trust_tier() {
        let v = validator();
        // 45% of cost: fine for a major retailer, too low for an unknown one.
        assert!(v.validate(&sample(45.0, "amazon"), 100.0, 0.0));
        assert!(!v.validate(&sample(45.0, "randomshop"), 100.0, 0.0));
    }

    #[test]
    fn cost_ceiling_only_applies_above_cost_100() {
        let v = validator();
        // cost 50: 12x cost passes even for unknown sources.
        assert!(v.validate(&sample(600.0, "randomshop"), 50.0, 0.0));
        // cost 200: 12x cost is rejected for unknown, accepted for major.
        assert!(!v.validate(&sample(2400.0, "randomshop"), 200.0, 0.0));
        assert!(v.validate(&sample(2400.0, "amazon"), 200.0, 0.0));
        assert!(!v.validate(&sample(3100.0, "amazon"), 200.0, 0.0));
    }

    #[test]
    fn current_price_window_depends_on_trust_tier() {
        let v = validator();
        // 0.07x current: below 0.1x unknown floor, above 0.05x major floor.
        assert!(!v.validate(&sample(7.0, "randomshop"), 0.0, 100.0));
        assert!(v.validate(&sample(7.0, "walmart"), 0.0, 100.0));
        // 5.5x current: beyond 5x unknown ceiling, within 6x major ceiling.
        assert!(!v.validate(&sample(550.0, "randomshop"), 0.0, 100.0));
        assert!(v.validate(&sample(550.0, "walmart"), 0.0, 100.0));
    }

    #[test]
    fn source_match_is_case_insensitive() {
        let v = validator();
        assert!(v.validate(&sample(45.0, "Amazon"), 100.0, 0.0));
    }

    #[test]
    fn relative_checks_skipped_without_references() {
        let v = validator();
        // No cost, no current price: only absolute bounds apply.
        assert!(v.validate(&sample(999_999.0, "randomshop"), 0.0, 0.0));
    }
}
