// Market-data collection: supplies raw, unvalidated price observations.
// Implementations own their timeout and caching policy; the engine only ever
// sees a materialized, finite sequence of samples.

pub mod cache;
pub mod http;

pub use cache::{CachedCollector, SampleCache};
pub use http::HttpCollector;

use crate::model::{CollectorError, PriceSample};

#[async_trait::async_trait]
pub trait MarketDataCollector: Send + Sync {
    async fn collect(
        &self,
        product_name: &str,
        category: &str,
    ) -> Result<Vec<PriceSample>, CollectorError>;
}
