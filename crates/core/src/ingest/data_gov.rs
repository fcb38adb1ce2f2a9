use crate::config::{env_or, Settings};
use crate::domain::market::{MarketPriceSummary, MarketRegion, PricePoint};
use crate::ingest::provider::PriceHistoryProvider;
use crate::ingest::types::{DataGovRecord, DataGovResponse, PriceRecord};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::time::Duration;

/// "Current daily price of various commodities from various markets (Mandi)".
const DEFAULT_BASE_URL: &str =
    "https://api.data.gov.in/resource/9ef84268-d588-465a-a308-a864a43d0070";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const HISTORY_LIMIT: u32 = 10;
const DIRECTORY_LIMIT: u32 = 1000;

/// Client for the data.gov.in mandi price resource.
#[derive(Debug, Clone)]
pub struct DataGovClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DataGovClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_data_gov_api_key()?.to_string();
        let base_url = std::env::var("DATA_GOV_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env_or("DATA_GOV_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        Self::new(base_url, api_key, Duration::from_secs(timeout_secs))
    }

    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build data.gov.in http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    async fn fetch_records(&self, params: Vec<(&str, String)>) -> Result<Vec<DataGovRecord>> {
        let mut query = params;
        query.push(("api-key", self.api_key.clone()));
        query.push(("format", "json".to_string()));

        let res = self
            .http
            .get(self.base_url.trim_end_matches('/'))
            .query(&query)
            .send()
            .await
            // The request URL carries the api key.
            .map_err(reqwest::Error::without_url)
            .context("data.gov.in request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .context("failed to read data.gov.in response")?;

        if !status.is_success() {
            tracing::error!(%status, body = %text, "data.gov.in returned an error status");
            anyhow::bail!("data.gov.in HTTP {status}");
        }

        let parsed = serde_json::from_str::<DataGovResponse>(&text)
            .with_context(|| format!("data.gov.in response is not valid JSON: {text}"))?;
        Ok(parsed.records)
    }

    /// Up to the last ten records for `commodity`, oldest first.
    pub async fn fetch_price_records(
        &self,
        commodity: &str,
        region: Option<&MarketRegion>,
    ) -> Result<Vec<PriceRecord>> {
        let records = self
            .fetch_records(price_history_params(commodity, region))
            .await?;
        Ok(chronological_price_records(records))
    }

    pub async fn distinct_states(&self) -> Result<Vec<String>> {
        let records = self
            .fetch_records(vec![
                ("fields", "state".to_string()),
                ("limit", DIRECTORY_LIMIT.to_string()),
            ])
            .await?;
        Ok(distinct_sorted(records.into_iter().map(|r| r.state)))
    }

    pub async fn markets_for_state(&self, state: &str) -> Result<Vec<String>> {
        let state = state.trim();
        if state.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .fetch_records(vec![
                ("fields", "market".to_string()),
                ("filters[state]", state.to_string()),
                ("limit", DIRECTORY_LIMIT.to_string()),
            ])
            .await?;
        Ok(distinct_sorted(records.into_iter().map(|r| r.market)))
    }

    /// Most recent record for the market, or `None` when it has no data.
    pub async fn latest_price(
        &self,
        commodity: &str,
        region: &MarketRegion,
    ) -> Result<Option<MarketPriceSummary>> {
        let records = self.fetch_price_records(commodity, Some(region)).await?;
        Ok(records.last().map(|latest| MarketPriceSummary {
            commodity: commodity.to_string(),
            state: region.state.clone(),
            market: region.market.clone(),
            min_price: latest.min_price,
            max_price: latest.max_price,
            modal_price: latest.modal_price,
            arrival_date: latest.arrival_date.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for DataGovClient {
    fn provider_name(&self) -> &'static str {
        "data_gov_in"
    }

    async fn fetch_prices(
        &self,
        commodity: &str,
        region: Option<&MarketRegion>,
    ) -> Result<Vec<PricePoint>> {
        let records = self.fetch_price_records(commodity, region).await?;
        Ok(records
            .into_iter()
            .map(|r| PricePoint {
                label: r.arrival_date,
                price: r.modal_price,
            })
            .collect())
    }
}

/// Newest-first query for the last `HISTORY_LIMIT` records of a commodity,
/// narrowed to a market only when one is given.
fn price_history_params(
    commodity: &str,
    region: Option<&MarketRegion>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![("filters[commodity]", commodity.to_string())];
    if let Some(region) = region {
        params.push(("filters[state]", region.state.clone()));
        params.push(("filters[market]", region.market.clone()));
    }
    params.push(("sort[arrival_date]", "desc".to_string()));
    params.push(("limit", HISTORY_LIMIT.to_string()));
    params
}

/// Converts the newest-first API rows into oldest-first price records,
/// dropping rows without a usable modal price.
fn chronological_price_records(records: Vec<DataGovRecord>) -> Vec<PriceRecord> {
    let mut out: Vec<PriceRecord> = records
        .into_iter()
        .filter_map(|r| match r.modal_price {
            Some(modal) if modal.is_finite() && modal >= 0.0 => Some(PriceRecord {
                min_price: r.min_price.unwrap_or(modal),
                max_price: r.max_price.unwrap_or(modal),
                modal_price: modal,
                arrival_date: r.arrival_date,
            }),
            _ => {
                tracing::warn!(
                    market = %r.market,
                    arrival_date = %r.arrival_date,
                    "skipping data.gov.in record without a valid modal price"
                );
                None
            }
        })
        .collect();
    out.reverse();
    out
}

fn distinct_sorted(values: impl Iterator<Item = String>) -> Vec<String> {
    values
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_prices_and_reverses_order() {
        let v = json!({
            "records": [
                {"state": "Bihar", "market": "Patna", "commodity": "Onion", "arrival_date": "03/06/2025",
                 "min_price": "2000", "max_price": "2400", "modal_price": "2200"},
                {"state": "Bihar", "market": "Patna", "commodity": "Onion", "arrival_date": "02/06/2025",
                 "min_price": "1900", "max_price": "2300", "modal_price": "2100"},
                {"state": "Bihar", "market": "Patna", "commodity": "Onion", "arrival_date": "01/06/2025",
                 "min_price": 1800, "max_price": 2200, "modal_price": 2000}
            ]
        });
        let parsed: DataGovResponse = serde_json::from_value(v).unwrap();
        let records = chronological_price_records(parsed.records);

        let dates: Vec<_> = records.iter().map(|r| r.arrival_date.as_str()).collect();
        assert_eq!(dates, ["01/06/2025", "02/06/2025", "03/06/2025"]);
        assert_eq!(records[2].modal_price, 2200.0);
        assert_eq!(records[0].min_price, 1800.0);
    }

    #[test]
    fn skips_rows_without_modal_price() {
        let v = json!({
            "records": [
                {"arrival_date": "02/06/2025", "modal_price": "NA"},
                {"arrival_date": "01/06/2025", "modal_price": "-5"},
                {"arrival_date": "31/05/2025", "modal_price": "1500"}
            ]
        });
        let parsed: DataGovResponse = serde_json::from_value(v).unwrap();
        let records = chronological_price_records(parsed.records);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].max_price, 1500.0);
    }

    #[test]
    fn missing_records_key_is_empty() {
        let parsed: DataGovResponse = serde_json::from_value(json!({"total": 0})).unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn history_query_filters_region_only_when_given() {
        let params = price_history_params("Onion", None);
        assert_eq!(
            params,
            [
                ("filters[commodity]", "Onion".to_string()),
                ("sort[arrival_date]", "desc".to_string()),
                ("limit", "10".to_string()),
            ]
        );

        let region = MarketRegion {
            state: "Bihar".to_string(),
            market: "Patna".to_string(),
        };
        let params = price_history_params("Onion", Some(&region));
        assert!(params.contains(&("filters[state]", "Bihar".to_string())));
        assert!(params.contains(&("filters[market]", "Patna".to_string())));
        assert!(params.contains(&("sort[arrival_date]", "desc".to_string())));
        assert!(params.contains(&("limit", "10".to_string())));
    }

    #[tokio::test]
    async fn connection_errors_do_not_leak_the_api_key() {
        // Nothing listens on port 1.
        let client = DataGovClient::new(
            "http://127.0.0.1:1/resource".to_string(),
            "secret-key-123".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.distinct_states().await.unwrap_err();
        let rendered = format!("{err:#} {err:?}");
        assert!(rendered.contains("data.gov.in request failed"));
        assert!(!rendered.contains("secret-key-123"), "{rendered}");
    }

    #[test]
    fn directory_values_are_distinct_and_sorted() {
        let values = ["Uttar Pradesh", "Bihar", " Bihar ", "", "Assam"]
            .into_iter()
            .map(String::from);
        assert_eq!(distinct_sorted(values), ["Assam", "Bihar", "Uttar Pradesh"]);
    }
}
