use crate::model::Product;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub collector_endpoint: String,
    pub check_interval_seconds: u64,
    #[serde(default = "default_major_retailers")]
    pub major_retailers: Vec<String>,
    #[serde(default = "default_luxury_categories")]
    pub luxury_categories: Vec<String>,
    #[serde(default = "default_freshness_window_hours")]
    pub freshness_window_hours: i64,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default)]
    pub products: Vec<Product>,
}

fn default_major_retailers() -> Vec<String> {
    ["amazon", "walmart", "target", "bestbuy", "homedepot", "wayfair"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_luxury_categories() -> Vec<String> {
    ["Shapewear", "Loungewear"].iter().map(|s| s.to_string()).collect()
}

fn default_freshness_window_hours() -> i64 {
    24
}

fn default_cache_ttl_seconds() -> u64 {
    3600
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "db_path": "data.db",
                "collector_endpoint": "http://localhost:9000/quotes",
                "check_interval_seconds": 3600
            }"#,
        )
        .unwrap();
        assert_eq!(config.freshness_window_hours, 24);
        assert_eq!(config.cache_ttl_seconds, 3600);
        assert!(config.major_retailers.contains(&"amazon".to_string()));
        assert!(config.luxury_categories.contains(&"Loungewear".to_string()));
        assert!(config.products.is_empty());
    }

    #[test]
    fn product_seeds_parse_with_optional_fields() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "db_path": "data.db",
                "collector_endpoint": "http://localhost:9000/quotes",
                "check_interval_seconds": 3600,
                "products": [
                    {
                        "id": "p1",
                        "name": "High-Waist Legging",
                        "cost_price": 50.0,
                        "current_price": 100.0
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.products.len(), 1);
        assert_eq!(config.products[0].sales_velocity, 0.0);
        assert!(config.products[0].competitor_price.is_none());
    }
}
