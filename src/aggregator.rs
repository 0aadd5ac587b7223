use crate::model::{MarketSummary, PriceSample, ScanSession};
use std::collections::{BTreeMap, HashSet};

/// Groups validated samples into scan sessions and derives trend and
/// distribution statistics for display. Decision logic does not depend on
/// this module.
pub struct MarketAggregator;

impl MarketAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Buckets samples by the hour they were observed in. Samples scraped in
    /// the same date-hour window almost always belong to one scan run, so
    /// each bucket is treated as one logical market snapshot. Sessions come
    /// back in chronological order; the distribution holds the latest
    /// session's prices (or all prices when there is only one session).
    pub fn aggregate(&self, samples: &[PriceSample]) -> MarketSummary {
        if samples.is_empty() {
            return MarketSummary {
                trend: Vec::new(),
                distribution: Vec::new(),
                all_prices: Vec::new(),
                total_samples: 0,
                scan_sessions: 0,
            };
        }

        // Lexicographic order of "%Y-%m-%d %H:00" keys is chronological.
        let mut sessions: BTreeMap<String, Vec<&PriceSample>> = BTreeMap::new();
        for sample in samples {
            let key = sample.observed_at.format("%Y-%m-%d %H:00").to_string();
            sessions.entry(key).or_default().push(sample);
        }

        let session_count = sessions.len();
        let mut trend = Vec::with_capacity(session_count);
        let mut all_prices = Vec::with_capacity(samples.len());
        let mut last_session_prices = Vec::new();

        for group in sessions.values() {
            let prices: Vec<f64> = group.iter().map(|s| s.price).collect();
            let count = prices.len();
            let sum: f64 = prices.iter().sum();
            let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let sources: HashSet<&str> = group.iter().map(|s| s.source.as_str()).collect();

            trend.push(ScanSession {
                started_at: group[0].observed_at,
                average: sum / count as f64,
                min,
                max,
                count,
                distinct_source_count: sources.len(),
            });
            all_prices.extend(prices.iter().copied());
            last_session_prices = prices;
        }

        let distribution = if session_count == 1 {
            all_prices.clone()
        } else {
            last_session_prices
        };

        MarketSummary {
            trend,
            distribution,
            all_prices,
            total_samples: samples.len(),
            scan_sessions: session_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_at(price: f64, source: &str, hour: u32, minute: u32) -> PriceSample {
        PriceSample {
            price,
            source: source.to_string(),
            url: String::new(),
            observed_at: Utc.with_ymd_and_hms(2024, 3, 10, hour, minute, 0).unwrap(),
        }
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        let summary = MarketAggregator::new().aggregate(&[]);
        assert!(summary.trend.is_empty());
        assert!(summary.distribution.is_empty());
        assert!(summary.all_prices.is_empty());
        assert_eq!(summary.total_samples, 0);
        assert_eq!(summary.scan_sessions, 0);
    }

    #[test]
    fn samples_in_same_hour_share_a_session() {
        let samples = vec![
            sample_at(90.0, "amazon", 9, 5),
            sample_at(100.0, "walmart", 9, 40),
            sample_at(110.0, "amazon", 9, 59),
        ];
        let summary = MarketAggregator::new().aggregate(&samples);
        assert_eq!(summary.scan_sessions, 1);
        let session = &summary.trend[0];
        assert_eq!(session.count, 3);
        assert_eq!(session.average, 100.0);
        assert_eq!(session.min, 90.0);
        assert_eq!(session.max, 110.0);
        assert_eq!(session.distinct_source_count, 2);
    }

    #[test]
    fn sessions_are_chronological_and_distribution_uses_latest() {
        let samples = vec![
            sample_at(200.0, "target", 14, 0),
            sample_at(90.0, "amazon", 9, 10),
            sample_at(95.0, "walmart", 9, 20),
        ];
        let summary = MarketAggregator::new().aggregate(&samples);
        assert_eq!(summary.scan_sessions, 2);
        assert_eq!(summary.trend[0].count, 2);
        assert_eq!(summary.trend[1].count, 1);
        assert!(summary.trend[0].started_at < summary.trend[1].started_at);
        // Latest session only.
        assert_eq!(summary.distribution, vec![200.0]);
        // Every price, in session order.
        assert_eq!(summary.all_prices, vec![90.0, 95.0, 200.0]);
        assert_eq!(summary.total_samples, 3);
    }

    #[test]
    fn single_session_distribution_includes_all_prices() {
        let samples = vec![sample_at(90.0, "amazon", 9, 0), sample_at(95.0, "ebay", 9, 30)];
        let summary = MarketAggregator::new().aggregate(&samples);
        assert_eq!(summary.distribution, vec![90.0, 95.0]);
        assert_eq!(summary.all_prices, vec![90.0, 95.0]);
    }

    #[test]
    fn session_average_is_the_raw_mean() {
        let samples = vec![
            sample_at(1.0, "amazon", 9, 0),
            sample_at(2.0, "walmart", 9, 15),
            sample_at(2.0, "target", 9, 30),
        ];
        let summary = MarketAggregator::new().aggregate(&samples);
        assert_eq!(summary.trend[0].average, 5.0 / 3.0);
    }

    #[test]
    fn summary_serializes_all_prices_in_camel_case() {
        let samples = vec![sample_at(90.0, "amazon", 9, 0)];
        let summary = MarketAggregator::new().aggregate(&samples);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["allPrices"], serde_json::json!([90.0]));
    }
}
