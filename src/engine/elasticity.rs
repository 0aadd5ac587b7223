/// Heuristic demand-elasticity estimate from product attributes.
///
/// Not fitted from sales history; a deterministic rule stack over category,
/// margin and sales velocity, clamped to a plausible retail band.
pub struct ElasticityEstimator {
    luxury_categories: Vec<String>,
}

pub const MIN_ELASTICITY: f64 = 0.5;
pub const MAX_ELASTICITY: f64 = 3.0;
const BASE_ELASTICITY: f64 = 1.5;

impl ElasticityEstimator {
    pub fn new(luxury_categories: &[String]) -> Self {
        Self {
            luxury_categories: luxury_categories.to_vec(),
        }
    }

    /// Adjustments are additive and always applied in the same order:
    /// luxury category -0.3; margin above 50% -0.5, else below 30% +0.3;
    /// velocity above 50 units/week +0.2. Result clamped to [0.5, 3.0].
    pub fn estimate(&self, category: &str, current_margin: f64, sales_velocity: f64) -> f64 {
        let mut elasticity = BASE_ELASTICITY;

        if self.luxury_categories.iter().any(|c| c == category) {
            elasticity -= 0.3;
        }

        if current_margin > 50.0 {
            elasticity -= 0.5;
        } else if current_margin < 30.0 {
            elasticity += 0.3;
        }

        if sales_velocity > 50.0 {
            elasticity += 0.2;
        }

        elasticity.clamp(MIN_ELASTICITY, MAX_ELASTICITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> ElasticityEstimator {
        ElasticityEstimator::new(&["Shapewear".to_string(), "Loungewear".to_string()])
    }

    #[test]
    fn luxury_high_margin_product() {
        // 1.5 - 0.3 (luxury) - 0.5 (margin > 50) = 0.7
        assert_eq!(estimator().estimate("Loungewear", 55.0, 10.0), 0.7);
    }

    #[test]
    fn low_margin_fast_mover() {
        // 1.5 + 0.3 (margin < 30) + 0.2 (velocity > 50) = 2.0
        assert_eq!(estimator().estimate("Basics", 20.0, 60.0), 2.0);
    }

    #[test]
    fn neutral_product_keeps_base() {
        assert_eq!(estimator().estimate("Basics", 40.0, 10.0), 1.5);
    }

    #[test]
    fn bounded_for_all_inputs() {
        let est = estimator();
        for category in ["Loungewear", "Shapewear", "Basics", ""] {
            for margin in [-50.0, 0.0, 29.9, 30.0, 50.0, 50.1, 500.0] {
                for velocity in [0.0, 50.0, 50.1, 10_000.0] {
                    let e = est.estimate(category, margin, velocity);
                    assert!((MIN_ELASTICITY..=MAX_ELASTICITY).contains(&e));
                }
            }
        }
    }

    #[test]
    fn deterministic() {
        let est = estimator();
        assert_eq!(
            est.estimate("Shapewear", 33.0, 51.0).to_bits(),
            est.estimate("Shapewear", 33.0, 51.0).to_bits()
        );
    }
}
