use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::ports::price::{PriceError, PriceOracle};

pub const DEFAULT_PRICE_API: &str = "https://lite-api.jup.ag/price/v3";

/// Spot USD price client over the Jupiter price API.
#[derive(Debug, Clone)]
pub struct JupiterPriceClient {
    http: Client,
    api_url: String,
}

impl JupiterPriceClient {
    pub fn new(api_url: String, timeout: Duration) -> Result<Self, PriceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceError::Http(e.to_string()))?;
        Ok(Self { http, api_url })
    }
}

impl Default for JupiterPriceClient {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_API.to_string(), Duration::from_secs(10))
            .expect("default reqwest client")
    }
}

#[async_trait]
impl PriceOracle for JupiterPriceClient {
    async fn get_usd_prices(&self, mints: &[String]) -> Result<HashMap<String, f64>, PriceError> {
        if mints.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}?ids={}", self.api_url, mints.join(","));

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PriceError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceError::Status(response.status().as_u16()));
        }

        let body: HashMap<String, PriceEntry> = response
            .json()
            .await
            .map_err(|e| PriceError::Parse(e.to_string()))?;

        // Mints the API does not know are absent; entries without a usd
        // price are dropped the same way.
        Ok(body
            .into_iter()
            .filter_map(|(mint, entry)| entry.usd_price.map(|p| (mint, p)))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    #[serde(rename = "usdPrice")]
    usd_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = JupiterPriceClient::new(DEFAULT_PRICE_API.to_string(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_response_shape_parses() {
        let json = r#"{
            "So11111111111111111111111111111111111111112": {"usdPrice": 147.23, "decimals": 9},
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v": {"usdPrice": 1.0}
        }"#;
        let body: HashMap<String, PriceEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(
            body["So11111111111111111111111111111111111111112"].usd_price,
            Some(147.23)
        );
    }

    #[test]
    fn test_entry_without_price_parses_as_none() {
        let json = r#"{"SomeMint": {"decimals": 6}}"#;
        let body: HashMap<String, PriceEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(body["SomeMint"].usd_price, None);
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let client = JupiterPriceClient::default();
        let prices = client.get_usd_prices(&[]).await.unwrap();
        assert!(prices.is_empty());
    }
}
