use crate::collector::MarketDataCollector;
use crate::engine::PriceOptimizer;
use crate::model::{PriceSample, Product, RecommendationRecord, StorageError};
use crate::storage::SqliteStorage;
use crate::validator::PriceSampleValidator;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Governs recommendation creation, refresh and status transitions.
///
/// States: pending -> applied | rejected, both terminal. Only pending records
/// may be refreshed, and at most one pending record exists per product.
///
/// The one-pending-per-product invariant is check-then-act against storage
/// and is NOT atomic: two concurrent `recommend` calls for the same product
/// can race into a duplicate or a lost refresh. Closing the window requires a
/// storage-level unique constraint or per-product serialization.
pub struct RecommendationLifecycle {
    storage: Arc<Mutex<SqliteStorage>>,
    collector: Arc<dyn MarketDataCollector>,
    validator: PriceSampleValidator,
    optimizer: PriceOptimizer,
    freshness_window: Duration,
}

impl RecommendationLifecycle {
    /// `freshness_window_hours` is the single canonical cutoff for deciding
    /// whether stored market data still counts as fresh, applied uniformly
    /// to both the reuse decision and the sample window.
    pub fn new(
        storage: Arc<Mutex<SqliteStorage>>,
        collector: Arc<dyn MarketDataCollector>,
        validator: PriceSampleValidator,
        freshness_window_hours: i64,
    ) -> Self {
        Self {
            storage,
            collector,
            validator,
            optimizer: PriceOptimizer::new(),
            freshness_window: Duration::hours(freshness_window_hours),
        }
    }

    /// Creates or refreshes the pending recommendation for a product.
    ///
    /// With fresh samples in the window, an existing pending record is
    /// recomputed and overwritten in place; without them it is returned
    /// unchanged. When no pending record exists, one is created, gathering
    /// samples from storage, the cataloged competitor price, or the
    /// collector, in that order.
    pub async fn recommend(&self, product_id: &str) -> Result<RecommendationRecord, StorageError> {
        let cutoff = Utc::now() - self.freshness_window;

        let (product, fresh_samples, existing) = {
            let storage = self.storage.lock().await;
            let product = storage.get_product(product_id)?;
            let fresh_samples = storage.samples_since(product_id, cutoff)?;
            let existing = storage.pending_recommendation(product_id)?;
            (product, fresh_samples, existing)
        };

        if let Some(existing) = existing {
            if fresh_samples.is_empty() {
                info!("no fresh market data for {}, reusing pending recommendation", product_id);
                return Ok(existing);
            }
            info!("refreshing pending recommendation for {} in place", product_id);
            let rec = self.optimizer.optimize(&product.context(), &fresh_samples);
            return self.storage.lock().await.update_pending(existing.id, &rec);
        }

        let samples = if !fresh_samples.is_empty() {
            fresh_samples
        } else {
            self.gather_samples(&product).await?
        };

        let rec = self.optimizer.optimize(&product.context(), &samples);
        info!(
            "new recommendation for {}: {} at {:.2} ({} risk)",
            product_id,
            rec.strategy,
            rec.suggested_price,
            rec.risk_level.as_str()
        );
        self.storage.lock().await.insert_recommendation(product_id, &rec)
    }

    /// Applies a pending recommendation: the status change and the write of
    /// the suggested price to the product happen in one transaction.
    pub async fn apply(&self, recommendation_id: i64) -> Result<RecommendationRecord, StorageError> {
        self.storage.lock().await.apply_recommendation(recommendation_id)
    }

    /// Rejects a pending recommendation. Terminal; the record is never
    /// touched again.
    pub async fn reject(&self, recommendation_id: i64) -> Result<RecommendationRecord, StorageError> {
        self.storage.lock().await.reject_recommendation(recommendation_id)
    }

    /// Fallback sample gathering for a product with no fresh stored data:
    /// the cataloged competitor price when present, otherwise a collector
    /// run whose accepted observations are persisted for later windows.
    async fn gather_samples(&self, product: &Product) -> Result<Vec<PriceSample>, StorageError> {
        if let Some(competitor_price) = product.competitor_price {
            if competitor_price > 0.0 {
                return Ok(vec![PriceSample {
                    price: competitor_price,
                    source: "catalog".to_string(),
                    url: String::new(),
                    observed_at: Utc::now(),
                }]);
            }
        }

        let raw = match self.collector.collect(&product.name, &product.category).await {
            Ok(samples) => samples,
            Err(e) => {
                // Collector trouble degrades to the No Data strategy rather
                // than failing the recommendation.
                warn!("collector error for {}: {}", product.id, e);
                return Ok(Vec::new());
            }
        };

        let mut accepted = Vec::new();
        for sample in raw {
            if self
                .validator
                .validate(&sample, product.cost_price, product.current_price)
            {
                accepted.push(sample);
            } else {
                info!("rejecting observed price {:.2} from {}", sample.price, sample.source);
            }
        }

        if !accepted.is_empty() {
            let storage = self.storage.lock().await;
            for sample in &accepted {
                storage.append_sample(&product.id, sample)?;
            }
            info!("stored {} validated samples for {}", accepted.len(), product.id);
        }

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CollectorError, RecommendationStatus, RiskLevel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCollector {
        prices: Vec<f64>,
        calls: AtomicUsize,
    }

    impl StubCollector {
        fn new(prices: &[f64]) -> Self {
            Self {
                prices: prices.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl MarketDataCollector for StubCollector {
        async fn collect(
            &self,
            _product_name: &str,
            _category: &str,
        ) -> Result<Vec<PriceSample>, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .prices
                .iter()
                .map(|p| PriceSample {
                    price: *p,
                    source: "amazon".to_string(),
                    url: "https://amazon.com/x".to_string(),
                    observed_at: Utc::now(),
                })
                .collect())
        }
    }

    struct FailingCollector;

    #[async_trait::async_trait]
    impl MarketDataCollector for FailingCollector {
        async fn collect(
            &self,
            _product_name: &str,
            _category: &str,
        ) -> Result<Vec<PriceSample>, CollectorError> {
            Err(CollectorError::Timeout)
        }
    }

    fn product(competitor_price: Option<f64>) -> Product {
        Product {
            id: "p1".to_string(),
            name: "High-Waist Legging".to_string(),
            sku: "HWL-1".to_string(),
            category: "Activewear".to_string(),
            cost_price: 50.0,
            current_price: 100.0,
            competitor_price,
            sales_velocity: 10.0,
        }
    }

    fn lifecycle_with(
        collector: Arc<dyn MarketDataCollector>,
        product: &Product,
    ) -> (RecommendationLifecycle, Arc<Mutex<SqliteStorage>>) {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.upsert_product(product).unwrap();
        let storage = Arc::new(Mutex::new(storage));
        let validator = PriceSampleValidator::new(&["amazon".to_string(), "walmart".to_string()]);
        let lifecycle = RecommendationLifecycle::new(storage.clone(), collector, validator, 24);
        (lifecycle, storage)
    }

    #[tokio::test]
    async fn collects_validates_and_persists_when_storage_is_empty() {
        let collector = Arc::new(StubCollector::new(&[90.0, 95.0, 100.0, 105.0, 3.0]));
        let (lifecycle, storage) = lifecycle_with(collector.clone(), &product(None));

        let rec = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(rec.recommendation.strategy, "Match Market");
        // 3.0 fails validation (below 0.1x current price); the other four stick.
        assert_eq!(rec.recommendation.suggested_price, 97.5);
        assert_eq!(storage.lock().await.samples_for_product("p1").unwrap().len(), 4);
        assert_eq!(collector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pending_record_is_reused_without_fresh_samples() {
        let collector = Arc::new(StubCollector::new(&[]));
        let (lifecycle, _storage) = lifecycle_with(collector.clone(), &product(None));

        let first = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(first.recommendation.strategy, "No Data");

        let second = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second, first);
        // Reuse path never re-runs the collector.
        assert_eq!(collector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_samples_refresh_the_pending_record_in_place() {
        let collector = Arc::new(StubCollector::new(&[]));
        let (lifecycle, storage) = lifecycle_with(collector, &product(None));

        let first = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(first.recommendation.strategy, "No Data");

        for price in [92.0, 96.0] {
            storage
                .lock()
                .await
                .append_sample(
                    "p1",
                    &PriceSample {
                        price,
                        source: "walmart".to_string(),
                        url: String::new(),
                        observed_at: Utc::now(),
                    },
                )
                .unwrap();
        }

        let refreshed = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(refreshed.recommendation.strategy, "Match Market");
        assert_eq!(refreshed.recommendation.suggested_price, 94.0);

        // Still exactly one pending record.
        let pending = storage.lock().await.pending_recommendation("p1").unwrap().unwrap();
        assert_eq!(pending.id, first.id);
    }

    #[tokio::test]
    async fn cataloged_competitor_price_beats_the_collector() {
        let collector = Arc::new(StubCollector::new(&[40.0]));
        let (lifecycle, _storage) = lifecycle_with(collector.clone(), &product(Some(98.0)));

        let rec = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(rec.recommendation.suggested_price, 98.0);
        assert_eq!(collector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn collector_failure_degrades_to_no_data() {
        let (lifecycle, _storage) = lifecycle_with(Arc::new(FailingCollector), &product(None));

        let rec = lifecycle.recommend("p1").await.unwrap();
        assert_eq!(rec.recommendation.strategy, "No Data");
        assert_eq!(rec.recommendation.risk_level, RiskLevel::Medium);
        assert_eq!(rec.recommendation.confidence_score, 50);
    }

    #[tokio::test]
    async fn apply_is_terminal_and_reprices_the_product() {
        let collector = Arc::new(StubCollector::new(&[90.0, 95.0, 100.0, 105.0]));
        let (lifecycle, storage) = lifecycle_with(collector, &product(None));

        let rec = lifecycle.recommend("p1").await.unwrap();
        let applied = lifecycle.apply(rec.id).await.unwrap();
        assert_eq!(applied.recommendation.status, RecommendationStatus::Applied);
        assert_eq!(storage.lock().await.get_product("p1").unwrap().current_price, 97.5);

        assert!(matches!(
            lifecycle.apply(rec.id).await,
            Err(StorageError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lifecycle.reject(rec.id).await,
            Err(StorageError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn reject_is_terminal() {
        let collector = Arc::new(StubCollector::new(&[95.0]));
        let (lifecycle, storage) = lifecycle_with(collector, &product(None));

        let rec = lifecycle.recommend("p1").await.unwrap();
        let rejected = lifecycle.reject(rec.id).await.unwrap();
        assert_eq!(rejected.recommendation.status, RecommendationStatus::Rejected);
        // Product price untouched.
        assert_eq!(storage.lock().await.get_product("p1").unwrap().current_price, 100.0);
        assert!(matches!(
            lifecycle.apply(rec.id).await,
            Err(StorageError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn missing_product_is_reported() {
        let collector = Arc::new(StubCollector::new(&[]));
        let (lifecycle, _storage) = lifecycle_with(collector, &product(None));
        assert!(matches!(
            lifecycle.recommend("ghost").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
