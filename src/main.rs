mod aggregator;
mod collector;
mod config;
mod engine;
mod lifecycle;
mod model;
mod storage;
mod utils;
mod validator;

use aggregator::MarketAggregator;
use collector::{CachedCollector, HttpCollector, MarketDataCollector};
use config::{load_config, AppConfig};
use engine::{ElasticityCurveGenerator, ElasticityEstimator};
use futures::future::join_all;
use lifecycle::RecommendationLifecycle;
use std::sync::Arc;
use std::time::Duration;
use storage::SqliteStorage;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber;
use validator::PriceSampleValidator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config: Arc<AppConfig> = match load_config("config.json") {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let storage = match SqliteStorage::new(&config.db_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    // Seed the catalog from config so the loop has something to price.
    {
        let storage_guard = storage.lock().await;
        for product in &config.products {
            if let Err(e) = storage_guard.upsert_product(product) {
                warn!("Failed to seed product {}: {:?}", product.id, e);
            }
        }
    }

    let collector: Arc<dyn MarketDataCollector> = Arc::new(CachedCollector::new(
        HttpCollector::new(&config.collector_endpoint),
        Duration::from_secs(config.cache_ttl_seconds),
    ));
    let validator = PriceSampleValidator::new(&config.major_retailers);
    let lifecycle = Arc::new(RecommendationLifecycle::new(
        storage.clone(),
        collector,
        validator,
        config.freshness_window_hours,
    ));
    let aggregator = MarketAggregator::new();
    let curves = ElasticityCurveGenerator::new(ElasticityEstimator::new(&config.luxury_categories));

    info!("price-pilot started, {} products in catalog", config.products.len());

    loop {
        let product_ids: Vec<String> = match storage.lock().await.list_products() {
            Ok(products) => products.into_iter().map(|p| p.id).collect(),
            Err(e) => {
                error!("Failed to list products: {:?}", e);
                Vec::new()
            }
        };

        let tasks: Vec<_> = product_ids
            .iter()
            .map(|id| process_product(id, lifecycle.clone(), storage.clone(), &aggregator, &curves))
            .collect();
        join_all(tasks).await;

        info!("Pass complete, sleeping {}s...", config.check_interval_seconds);
        sleep(Duration::from_secs(config.check_interval_seconds)).await;
    }
}

/// Prices one product: refresh its recommendation, log the market trend and
/// the demand-curve optimum.
async fn process_product(
    product_id: &str,
    lifecycle: Arc<RecommendationLifecycle>,
    storage: Arc<Mutex<SqliteStorage>>,
    aggregator: &MarketAggregator,
    curves: &ElasticityCurveGenerator,
) {
    info!("Processing product: {}", product_id);

    let record = match lifecycle.recommend(product_id).await {
        Ok(record) => record,
        Err(e) => {
            warn!("Recommendation failed for {}: {}", product_id, e);
            return;
        }
    };
    let rec = &record.recommendation;
    info!(
        "{}: suggest {:.2} | {} | confidence {} | risk {} | {}",
        product_id,
        rec.suggested_price,
        rec.strategy,
        rec.confidence_score,
        rec.risk_level.as_str(),
        rec.rationale
    );
    match serde_json::to_string(&record) {
        Ok(json) => info!("recommendation payload: {}", json),
        Err(e) => warn!("Failed to serialize recommendation: {}", e),
    }

    let (product, samples) = {
        let storage_guard = storage.lock().await;
        let product = match storage_guard.get_product(product_id) {
            Ok(p) => p,
            Err(e) => {
                warn!("Product read failed for {}: {}", product_id, e);
                return;
            }
        };
        let samples = storage_guard.samples_for_product(product_id).unwrap_or_default();
        (product, samples)
    };

    let summary = aggregator.aggregate(&samples);
    if let Some(latest) = summary.trend.last() {
        info!(
            "{}: {} samples over {} scan sessions, latest avg {:.2} ({} sources)",
            product_id,
            summary.total_samples,
            summary.scan_sessions,
            latest.average,
            latest.distinct_source_count
        );
    }

    let base_demand = if product.sales_velocity > 0.0 {
        product.sales_velocity
    } else {
        100.0
    };
    let report = curves.report(&product.context(), rec.suggested_price, base_demand);
    info!(
        "{}: optimal price {:.2} (profit {:.2}, demand {:.1})",
        product_id, report.optimal_price, report.optimal_profit, report.optimal_demand
    );
}
