use crate::engine::elasticity::ElasticityEstimator;
use crate::model::{CurvePoint, CurveReport, PricingContext};
use crate::utils::{margin_percent, round1, round2};

const CURVE_POINTS: usize = 20;

// Demand is clamped so a steep curve cannot explode at the cheap end.
const MAX_DEMAND_MULTIPLIER: f64 = 3.0;

/// Builds the demand/revenue/profit curve over a bounded price range under a
/// constant-elasticity demand model anchored at the current price, and
/// derives the profit-maximizing price.
pub struct ElasticityCurveGenerator {
    estimator: ElasticityEstimator,
}

impl ElasticityCurveGenerator {
    pub fn new(estimator: ElasticityEstimator) -> Self {
        Self { estimator }
    }

    /// Demand at price `p`: `base * (current / p)^elasticity`, clamped to
    /// `[0, 3 * base]`. A non-positive price degenerates to base demand.
    fn demand_at(&self, price: f64, current_price: f64, base_demand: f64, elasticity: f64) -> f64 {
        let ratio = if price > 0.0 { current_price / price } else { 1.0 };
        (base_demand * ratio.powf(elasticity)).clamp(0.0, base_demand * MAX_DEMAND_MULTIPLIER)
    }

    pub fn report(&self, ctx: &PricingContext, suggested_price: f64, base_demand: f64) -> CurveReport {
        let current_price = ctx.current_price;
        let cost_price = ctx.cost_price;
        let current_margin = margin_percent(current_price, cost_price);
        let elasticity = self
            .estimator
            .estimate(&ctx.category, current_margin, ctx.sales_velocity);

        // Price range around the current price, kept above a fraction of cost.
        let min_price = (cost_price * 0.8).max(current_price * 0.5);
        let max_price = (current_price * 2.0).min(current_price * 1.5);

        let mut curve = Vec::with_capacity(CURVE_POINTS);
        for i in 0..CURVE_POINTS {
            let price = min_price + (max_price - min_price) * (i as f64 / (CURVE_POINTS - 1) as f64);
            let price = round2(price);
            let demand = round1(self.demand_at(price, current_price, base_demand, elasticity));
            curve.push(CurvePoint {
                price,
                demand,
                revenue: round2(demand * price),
                profit: round2(demand * (price - cost_price)),
                profit_margin: round1(margin_percent(price, cost_price)),
            });
        }

        let current_demand = base_demand;
        let suggested_demand = self.demand_at(suggested_price, current_price, base_demand, elasticity);

        let current_revenue = current_demand * current_price;
        let suggested_revenue = suggested_demand * suggested_price;
        let revenue_change = suggested_revenue - current_revenue;
        let revenue_change_percent = if current_revenue > 0.0 {
            revenue_change / current_revenue * 100.0
        } else {
            0.0
        };

        let current_profit = current_demand * (current_price - cost_price);
        let suggested_profit = suggested_demand * (suggested_price - cost_price);
        let profit_change = suggested_profit - current_profit;
        let profit_change_percent = if current_profit > 0.0 {
            profit_change / current_profit * 100.0
        } else {
            0.0
        };

        let demand_change = suggested_demand - current_demand;
        let demand_change_percent = if current_demand > 0.0 {
            demand_change / current_demand * 100.0
        } else {
            0.0
        };

        let (optimal_price, optimal_demand, optimal_profit) =
            self.optimal_point(&curve, ctx, base_demand, elasticity);

        CurveReport {
            curve,
            current_price,
            suggested_price,
            current_demand: round1(current_demand),
            suggested_demand: round1(suggested_demand),
            demand_change: round1(demand_change),
            demand_change_percent: round1(demand_change_percent),
            base_demand,
            cost_price,
            current_revenue: round2(current_revenue),
            suggested_revenue: round2(suggested_revenue),
            revenue_change: round2(revenue_change),
            revenue_change_percent: round1(revenue_change_percent),
            current_profit: round2(current_profit),
            suggested_profit: round2(suggested_profit),
            profit_change: round2(profit_change),
            profit_change_percent: round1(profit_change_percent),
            optimal_price,
            optimal_demand,
            optimal_profit,
        }
    }

    /// Closed-form optimum of `profit(p) = base * (current/p)^e * (p - cost)`:
    /// the first-order condition gives `p* = cost * e / (e - 1)`, valid for
    /// elastic demand (`e > 1`) and positive cost. The formula result is
    /// clamped into the plausible band and cross-checked against the best
    /// discretely sampled point; the discrete maximum wins whenever the
    /// formula path is unavailable or inconsistent.
    fn optimal_point(
        &self,
        curve: &[CurvePoint],
        ctx: &PricingContext,
        base_demand: f64,
        elasticity: f64,
    ) -> (f64, f64, f64) {
        let discrete_max = curve
            .iter()
            .max_by(|a, b| a.profit.total_cmp(&b.profit))
            .cloned();
        let discrete = match discrete_max {
            Some(point) => (point.price, point.demand, point.profit),
            None => (ctx.current_price, base_demand, 0.0),
        };

        if elasticity <= 1.0 || ctx.cost_price <= 0.0 {
            return discrete;
        }

        let optimal_price = ctx.cost_price * elasticity / (elasticity - 1.0);
        if !optimal_price.is_finite() {
            return discrete;
        }
        let optimal_price = optimal_price
            .max(ctx.cost_price * 1.1)
            .min(ctx.current_price * 2.0);

        let optimal_demand = self.demand_at(optimal_price, ctx.current_price, base_demand, elasticity);
        let optimal_profit = optimal_demand * (optimal_price - ctx.cost_price);

        // Numerical-consistency guard: the clamped formula price must beat
        // every sampled point, otherwise the sampled maximum stands.
        if optimal_profit >= discrete.2 {
            (round2(optimal_price), round1(optimal_demand), round2(optimal_profit))
        } else {
            discrete
        }
    }
}
