use crate::collector::MarketDataCollector;
use crate::model::{CollectorError, PriceSample};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

// Raw observations beyond this count add noise, not signal.
const MAX_SAMPLES: usize = 20;

/// One quote as returned by the price feed.
#[derive(Debug, Deserialize)]
struct Quote {
    price: f64,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
}

/// Collects competitor quotes from an HTTP price feed returning a JSON array
/// of `{price, source, url}` objects.
pub struct HttpCollector {
    client: Client,
    endpoint: String,
}

impl HttpCollector {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) PricePilot/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Derives a retailer name from a product URL when the feed leaves the
    /// source field empty.
    fn retailer_from_url(url: &str) -> Option<&'static str> {
        let url = url.to_lowercase();
        let retailers: [(&str, &str); 11] = [
            ("amazon", "amazon"),
            ("walmart", "walmart"),
            ("target.com", "target"),
            ("bestbuy", "bestbuy"),
            ("homedepot", "homedepot"),
            ("lowes", "lowes"),
            ("wayfair", "wayfair"),
            ("ebay", "ebay"),
            ("etsy", "etsy"),
            ("costco", "costco"),
            ("newegg", "newegg"),
        ];
        retailers
            .iter()
            .find(|(pattern, _)| url.contains(pattern))
            .map(|(_, name)| *name)
    }
}

#[async_trait::async_trait]
impl MarketDataCollector for HttpCollector {
    async fn collect(
        &self,
        product_name: &str,
        category: &str,
    ) -> Result<Vec<PriceSample>, CollectorError> {
        let query = if category.is_empty() {
            product_name.to_string()
        } else {
            format!("{} {}", product_name, category)
        };
        info!("collecting market prices for: {}", query);

        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str())])
            .send();
        let response = match timeout(Duration::from_secs(15), request).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("price feed timed out for: {}", query);
                return Err(CollectorError::Timeout);
            }
        };

        if !response.status().is_success() {
            return Err(CollectorError::InvalidResponse(format!(
                "price feed returned {}",
                response.status()
            )));
        }

        let quotes: Vec<Quote> = response.json().await?;
        let observed_at = Utc::now();
        let samples: Vec<PriceSample> = quotes
            .into_iter()
            .filter(|q| q.price > 0.0)
            .take(MAX_SAMPLES)
            .map(|q| {
                let source = if q.source.is_empty() {
                    Self::retailer_from_url(&q.url)
                        .unwrap_or("unknown")
                        .to_string()
                } else {
                    q.source
                };
                PriceSample {
                    price: q.price,
                    source,
                    url: q.url,
                    observed_at,
                }
            })
            .collect();

        info!("collected {} quotes for: {}", samples.len(), query);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retailer_extraction_from_url() {
        assert_eq!(
            HttpCollector::retailer_from_url("https://www.amazon.com/dp/B0"),
            Some("amazon")
        );
        assert_eq!(
            HttpCollector::retailer_from_url("https://WWW.TARGET.COM/p/1"),
            Some("target")
        );
        assert_eq!(HttpCollector::retailer_from_url("https://example.com/p"), None);
    }

    #[test]
    fn quote_parsing_tolerates_missing_fields() {
        let quotes: Vec<Quote> =
            serde_json::from_str(r#"[{"price": 19.99}, {"price": 25.0, "source": "ebay", "url": "https://ebay.com/i/1"}]"#)
                .unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].price, 19.99);
        assert!(quotes[0].source.is_empty());
        assert_eq!(quotes[1].source, "ebay");
    }
}
