// Core structs: PriceSample, PricingContext, Recommendation, ScanSession, CurvePoint
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single externally observed competitor price. Immutable once created;
/// produced by the market-data collector or read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub source: String,
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

/// Read-only product snapshot the engine computes against. The engine never
/// mutates it; applying a suggested price is the caller's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingContext {
    pub cost_price: f64,
    pub current_price: f64,
    pub competitor_price: Option<f64>,
    pub category: String,
    pub sales_velocity: f64,
}

/// Persisted product row. `context()` takes the pricing snapshot the engine
/// operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub category: String,
    pub cost_price: f64,
    pub current_price: f64,
    #[serde(default)]
    pub competitor_price: Option<f64>,
    #[serde(default)]
    pub sales_velocity: f64,
}

impl Product {
    pub fn context(&self) -> PricingContext {
        PricingContext {
            cost_price: self.cost_price,
            current_price: self.current_price,
            competitor_price: self.competitor_price,
            category: self.category.clone(),
            sales_velocity: self.sales_velocity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Applied,
    Rejected,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Applied => "applied",
            RecommendationStatus::Rejected => "rejected",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecommendationStatus::Pending)
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimizer output. Serializes to the camelCase shape consumed by callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub suggested_price: f64,
    pub predicted_margin: f64,
    pub confidence_score: u8,
    pub rationale: String,
    pub status: RecommendationStatus,
    pub risk_level: RiskLevel,
    pub competitor_min_price: f64,
    pub competitor_max_price: f64,
    pub market_position: String,
    pub strategy: String,
    pub implementation_timing: String,
    pub revenue_impact: f64,
}

/// A recommendation as stored, with its row identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRecord {
    pub id: i64,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub recommendation: Recommendation,
}

/// One hour-bucketed group of samples treated as a single market snapshot.
/// Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    pub started_at: DateTime<Utc>,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub distinct_source_count: usize,
}

/// Aggregated view over a product's sample history: chronological session
/// trend, the price distribution of the latest scan, and every price in
/// session order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub trend: Vec<ScanSession>,
    pub distribution: Vec<f64>,
    pub all_prices: Vec<f64>,
    pub total_samples: usize,
    pub scan_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePoint {
    pub price: f64,
    pub demand: f64,
    pub revenue: f64,
    pub profit: f64,
    pub profit_margin: f64,
}

/// Full demand/revenue/profit curve over a bounded price range, with the
/// derived profit-maximizing price.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveReport {
    pub curve: Vec<CurvePoint>,
    pub current_price: f64,
    pub suggested_price: f64,
    pub current_demand: f64,
    pub suggested_demand: f64,
    pub demand_change: f64,
    pub demand_change_percent: f64,
    pub base_demand: f64,
    pub cost_price: f64,
    pub current_revenue: f64,
    pub suggested_revenue: f64,
    pub revenue_change: f64,
    pub revenue_change_percent: f64,
    pub current_profit: f64,
    pub suggested_profit: f64,
    pub profit_change: f64,
    pub profit_change_percent: f64,
    pub optimal_price: f64,
    pub optimal_profit: f64,
    pub optimal_demand: f64,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RecommendationStatus,
        to: RecommendationStatus,
    },
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("collector timed out")]
    Timeout,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
