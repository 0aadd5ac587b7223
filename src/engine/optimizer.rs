use crate::model::{PriceSample, PricingContext, Recommendation, RecommendationStatus, RiskLevel};
use crate::utils::{margin_percent, round1, round2};
use tracing::debug;

// Suggested prices should normally keep at least a 20% margin over cost;
// clamping is only acceptable when the market sits within 10% of that floor.
const MARGIN_FLOOR_RATIO: f64 = 1.2;
const CLAMP_TOLERANCE_RATIO: f64 = 1.1;

// Secondary plausibility window around the current price, applied on top of
// per-sample validation before computing aggregate statistics.
const MIN_REASONABLE_FACTOR: f64 = 0.1;
const MAX_REASONABLE_FACTOR: f64 = 5.0;

/// Turns a pricing context plus validated competitor samples into a bounded,
/// explainable, risk-annotated price recommendation. Pure computation: the
/// same inputs always produce the same output, and no branch can fail.
pub struct PriceOptimizer;

impl PriceOptimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(&self, ctx: &PricingContext, samples: &[PriceSample]) -> Recommendation {
        let current_price = ctx.current_price;
        let cost_price = ctx.cost_price;
        let current_margin = margin_percent(current_price, cost_price);

        let mut prices: Vec<f64> = samples.iter().map(|s| s.price).collect();

        // Even individually valid samples can be collectively implausible
        // (e.g. all accessories for a flagship product). Re-filter around the
        // current price; if that empties the set, keep the originals.
        if !prices.is_empty() && current_price > 0.0 {
            let min_reasonable = current_price * MIN_REASONABLE_FACTOR;
            let max_reasonable = current_price * MAX_REASONABLE_FACTOR;
            let filtered: Vec<f64> = prices
                .iter()
                .copied()
                .filter(|p| (min_reasonable..=max_reasonable).contains(p))
                .collect();
            if !filtered.is_empty() {
                debug!("re-filtered competitor prices: {} remain", filtered.len());
                prices = filtered;
            } else {
                debug!("all competitor prices re-filtered out, using unfiltered set");
            }
        }

        let avg_competitor = if prices.is_empty() {
            current_price
        } else {
            prices.iter().sum::<f64>() / prices.len() as f64
        };
        let (min_competitor, max_competitor) = if prices.is_empty() {
            (current_price * 0.9, current_price * 1.15)
        } else {
            (
                prices.iter().cloned().fold(f64::INFINITY, f64::min),
                prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        let (mut suggested_price, strategy, mut rationale, confidence_score, mut risk_level, market_position) =
            if prices.is_empty() {
                (
                    current_price,
                    "No Data".to_string(),
                    "No recent market data available. Using current price.".to_string(),
                    50u8,
                    RiskLevel::Medium,
                    "Unknown".to_string(),
                )
            } else {
                (
                    avg_competitor,
                    "Match Market".to_string(),
                    format!(
                        "Price matched to market average from {} scraped sources. \
                         Aligning with current market conditions.",
                        prices.len()
                    ),
                    85u8,
                    RiskLevel::Low,
                    "Competitive".to_string(),
                )
            };

        // Margin floor. A market price slightly under the floor is clamped up;
        // a market price far below it stands as-is but is flagged, because
        // silently repricing 20% over cost would put us out of the market.
        let min_price = cost_price * MARGIN_FLOOR_RATIO;
        if suggested_price < min_price {
            if suggested_price >= cost_price * CLAMP_TOLERANCE_RATIO {
                suggested_price = min_price;
                rationale.push_str(" Adjusted to maintain minimum 20% margin.");
                risk_level = RiskLevel::Medium;
            } else {
                rationale.push_str(
                    " WARNING: Market price is below recommended minimum margin. \
                     Consider reviewing cost structure.",
                );
                risk_level = RiskLevel::High;
            }
        }

        let predicted_margin = margin_percent(suggested_price, cost_price);

        // Weekly velocity projected over a month.
        let price_change = suggested_price - current_price;
        let revenue_impact = ctx.sales_velocity * price_change * 4.0;

        let implementation_timing = if risk_level == RiskLevel::High
            || price_change.abs() > current_price * 0.1
        {
            "Phased - Monitor closely"
        } else if price_change > 0.0 && current_margin < 30.0 {
            "Immediate - High opportunity"
        } else {
            "Immediate"
        };

        Recommendation {
            suggested_price: round2(suggested_price),
            predicted_margin: round1(predicted_margin),
            confidence_score,
            rationale,
            status: RecommendationStatus::Pending,
            risk_level,
            competitor_min_price: round2(min_competitor),
            competitor_max_price: round2(max_competitor),
            market_position,
            strategy,
            implementation_timing: implementation_timing.to_string(),
            revenue_impact: revenue_impact.round(),
        }
    }
}
